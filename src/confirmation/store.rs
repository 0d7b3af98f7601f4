//! `client_confirmation` persistence

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgConnection;

use super::code::{ConfirmationCode, ConfirmationGenerator};
use crate::core_types::{ClientId, ConfirmationId};
use crate::error::{ServiceError, ServiceResult};

/// Attempts per issue before giving up on id collisions
pub const ISSUE_ATTEMPTS: usize = 3;

/// Insert side of confirmation issuing
#[async_trait]
pub trait ConfirmationSink: Send {
    /// `false` when `id` is already taken
    async fn try_insert(
        &mut self,
        id: ConfirmationId,
        client: ClientId,
        code: ConfirmationCode,
    ) -> ServiceResult<bool>;
}

#[async_trait]
impl ConfirmationSink for PgConnection {
    async fn try_insert(
        &mut self,
        id: ConfirmationId,
        client: ClientId,
        code: ConfirmationCode,
    ) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO client_confirmation (id, time, code, client)
               VALUES ($1, NOW(), $2, $3)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(code.as_i32())
        .bind(client)
        .execute(&mut *self)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Issue a confirmation for `client`, drawing a new id on each collision.
/// Fails with `ConfirmationIdExhausted` after `ISSUE_ATTEMPTS` collisions.
pub async fn issue_confirmation<S>(
    sink: &mut S,
    client: ClientId,
    generator: &dyn ConfirmationGenerator,
) -> ServiceResult<(ConfirmationId, ConfirmationCode)>
where
    S: ConfirmationSink + ?Sized,
{
    let code = generator.next_code();
    for attempt in 1..=ISSUE_ATTEMPTS {
        let id = generator.next_id();
        if sink.try_insert(id, client, code).await? {
            return Ok((id, code));
        }
        tracing::warn!(attempt, confirmation_id = %id, "Confirmation ID collision");
    }
    Err(ServiceError::ConfirmationIdExhausted(ISSUE_ATTEMPTS))
}

/// Accept `(id, code)` and purge every confirmation older than `live_time`.
///
/// One `DELETE`: the purge happens whether or not the code matches. A matching
/// row that is itself expired is removed and still rejected.
pub async fn accept_confirmation(
    conn: &mut PgConnection,
    id: ConfirmationId,
    code: ConfirmationCode,
    live_time: chrono::Duration,
) -> ServiceResult<Option<ClientId>> {
    let rows = sqlx::query(
        r#"DELETE FROM client_confirmation
           WHERE time < NOW() - $3 OR (id = $1 AND code = $2)
           RETURNING id, client, code, (time < NOW() - $3) AS expired"#,
    )
    .bind(id)
    .bind(code.as_i32())
    .bind(live_time)
    .fetch_all(conn)
    .await?;

    let mut accepted = None;
    let mut purged = 0usize;
    for row in &rows {
        let row_id: ConfirmationId = row.try_get("id")?;
        let row_code: i32 = row.try_get("code")?;
        let expired: bool = row.try_get("expired")?;
        if expired {
            purged += 1;
        }
        if row_id == id && row_code == code.as_i32() && !expired {
            accepted = Some(row.try_get("client")?);
        }
    }

    if purged > 0 {
        tracing::info!(purged, "Expired confirmations removed");
    }
    Ok(accepted)
}

/// Latest confirmation of `client` issued within `within`
pub async fn find_last_confirmation(
    conn: &mut PgConnection,
    client: ClientId,
    within: chrono::Duration,
) -> ServiceResult<Option<ConfirmationId>> {
    let row = sqlx::query(
        r#"SELECT id FROM client_confirmation
           WHERE client = $1 AND time >= NOW() - $2
           ORDER BY time DESC
           LIMIT 1"#,
    )
    .bind(client)
    .bind(within)
    .fetch_optional(conn)
    .await?;

    match row {
        Some(row) => Ok(Some(row.try_get("id")?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory sink with a set of already used ids
    struct MemorySink {
        taken: HashSet<ConfirmationId>,
        attempts: usize,
    }

    #[async_trait]
    impl ConfirmationSink for MemorySink {
        async fn try_insert(
            &mut self,
            id: ConfirmationId,
            _client: ClientId,
            _code: ConfirmationCode,
        ) -> ServiceResult<bool> {
            self.attempts += 1;
            Ok(self.taken.insert(id))
        }
    }

    /// Yields ids from a fixed list, then fresh ones
    struct ScriptedGenerator {
        ids: Mutex<Vec<ConfirmationId>>,
    }

    impl ConfirmationGenerator for ScriptedGenerator {
        fn next_id(&self) -> ConfirmationId {
            self.ids.lock().unwrap().pop().unwrap_or_default()
        }

        fn next_code(&self) -> ConfirmationCode {
            ConfirmationCode::new(123456).unwrap()
        }
    }

    #[tokio::test]
    async fn test_issue_first_try() {
        let mut sink = MemorySink {
            taken: HashSet::new(),
            attempts: 0,
        };
        let generator = ScriptedGenerator {
            ids: Mutex::new(vec![]),
        };
        let (id, code) = issue_confirmation(&mut sink, ClientId::new(), &generator)
            .await
            .unwrap();
        assert_eq!(sink.attempts, 1);
        assert!(sink.taken.contains(&id));
        assert_eq!(code.value(), 123456);
    }

    #[tokio::test]
    async fn test_issue_retries_on_collision() {
        let taken = ConfirmationId::new();
        let mut sink = MemorySink {
            taken: HashSet::from([taken]),
            attempts: 0,
        };
        let generator = ScriptedGenerator {
            ids: Mutex::new(vec![taken, taken]),
        };
        let (id, _) = issue_confirmation(&mut sink, ClientId::new(), &generator)
            .await
            .unwrap();
        assert_ne!(id, taken);
        assert_eq!(sink.attempts, 3);
    }

    #[tokio::test]
    async fn test_issue_gives_up_after_bound() {
        let taken = ConfirmationId::new();
        let mut sink = MemorySink {
            taken: HashSet::from([taken]),
            attempts: 0,
        };
        let generator = ScriptedGenerator {
            ids: Mutex::new(vec![taken; 10]),
        };
        let err = issue_confirmation(&mut sink, ClientId::new(), &generator)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConfirmationIdExhausted(ISSUE_ATTEMPTS)));
        assert_eq!(sink.attempts, ISSUE_ATTEMPTS);
    }
}
