//! Rotating bearer sessions
//!
//! A token chain moves `Issued -> Rotated(n) -> Dead`. Each rotation replaces
//! the current token and keeps exactly one predecessor in `token_prev`, so a
//! token stays valid for plain authentication for one generation after it was
//! rotated away. Rotation itself only accepts the current token.
//!
//! Two callers presenting the same token concurrently race for the rotation:
//! the first wins, the second finds no current token and is denied even
//! though its token is still in the grace slot.

mod bearer;

pub use bearer::{AUTH_TOKEN_HEADER, parse_bearer};

use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgConnection;
use sqlx::types::Json;

use crate::core_types::{ClientId, SessionToken};
use crate::error::ServiceResult;

/// Audit data bound to a session chain when it is created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

pub struct SessionTokenAuthority;

impl SessionTokenAuthority {
    /// Start a new chain for `client`. Chains are independent: logging in from
    /// a second device does not touch the first.
    pub async fn create_auth(
        conn: &mut PgConnection,
        client: ClientId,
        meta: &SessionMeta,
    ) -> ServiceResult<SessionToken> {
        let token = SessionToken::new();
        sqlx::query(
            r#"INSERT INTO session_token (token, client, time, update_time, token_prev, meta)
               VALUES ($1, $2, NOW(), NOW(), NULL, $3)"#,
        )
        .bind(token)
        .bind(client)
        .bind(Json(meta))
        .execute(conn)
        .await?;

        tracing::debug!(client = %client, "Session created");
        Ok(token)
    }

    /// Rotate `old` to a fresh token.
    ///
    /// `None` when `old` is not the current token of any chain: unknown,
    /// revoked, or already rotated.
    pub async fn recreate_auth(
        conn: &mut PgConnection,
        old: SessionToken,
    ) -> ServiceResult<Option<(SessionToken, ClientId)>> {
        let new = SessionToken::new();
        let row = sqlx::query(
            r#"UPDATE session_token
               SET token_prev = token, token = $2, update_time = NOW()
               WHERE token = $1
               RETURNING client"#,
        )
        .bind(old)
        .bind(new)
        .fetch_optional(conn)
        .await?;

        match row {
            Some(row) => Ok(Some((new, row.try_get("client")?))),
            None => Ok(None),
        }
    }

    /// Non-rotating check: passes for the current token and for its
    /// immediate predecessor.
    pub async fn authenticate(
        conn: &mut PgConnection,
        token: SessionToken,
    ) -> ServiceResult<Option<ClientId>> {
        let row = sqlx::query(
            r#"SELECT client FROM session_token
               WHERE token = $1 OR token_prev = $1
               LIMIT 1"#,
        )
        .bind(token)
        .fetch_optional(conn)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("client")?)),
            None => Ok(None),
        }
    }

    /// Drop the chain `token` belongs to (as current or previous value)
    pub async fn revoke_client_auth(
        conn: &mut PgConnection,
        token: SessionToken,
        client: ClientId,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"DELETE FROM session_token
               WHERE client = $2 AND (token = $1 OR token_prev = $1)"#,
        )
        .bind(token)
        .bind(client)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop every chain of `client`
    pub async fn revoke_all_client_auth(
        conn: &mut PgConnection,
        client: ClientId,
    ) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM session_token WHERE client = $1")
            .bind(client)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
