//! Client registration records

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::postgres::{PgConnection, PgRow};

use crate::core_types::ClientId;
use crate::error::{ServiceError, ServiceResult};
use crate::validation::{ClientName, Email};

/// Unique index enforcing case-insensitive email uniqueness
const EMAIL_INDEX: &str = "client_email_idx";

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: ClientId,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub time: DateTime<Utc>,
    /// Flips once, on the first successful 2FA
    pub confirmed: bool,
}

impl Client {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            time: row.try_get("time")?,
            confirmed: row.try_get("confirmed")?,
        })
    }
}

pub struct ClientRepository;

impl ClientRepository {
    /// Insert an unconfirmed client. A case-insensitive email duplicate is
    /// reported as `EmailTaken`.
    pub async fn create(
        conn: &mut PgConnection,
        email: &Email,
        name: &ClientName,
        password_hash: &str,
    ) -> ServiceResult<Client> {
        let result = sqlx::query(
            r#"INSERT INTO client (id, email, name, password_hash, time, confirmed)
               VALUES ($1, $2, $3, $4, NOW(), FALSE)
               RETURNING id, email, name, password_hash, time, confirmed"#,
        )
        .bind(ClientId::new())
        .bind(email.as_str())
        .bind(name.as_str())
        .bind(password_hash)
        .fetch_one(conn)
        .await;

        match result {
            Ok(row) => Ok(Client::from_row(&row)?),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() && db.constraint() == Some(EMAIL_INDEX) =>
            {
                Err(ServiceError::EmailTaken(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(
            r#"SELECT id, email, name, password_hash, time, confirmed
               FROM client WHERE LOWER(email) = LOWER($1)"#,
        )
        .bind(email.trim())
        .fetch_optional(conn)
        .await?;

        Ok(row.as_ref().map(Client::from_row).transpose()?)
    }

    pub async fn get(conn: &mut PgConnection, id: ClientId) -> ServiceResult<Client> {
        let row = sqlx::query(
            r#"SELECT id, email, name, password_hash, time, confirmed
               FROM client WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        match row {
            Some(row) => Ok(Client::from_row(&row)?),
            None => Err(ServiceError::ClientNotFound),
        }
    }

    pub async fn mark_confirmed(conn: &mut PgConnection, id: ClientId) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE client SET confirmed = TRUE WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::ClientNotFound);
        }
        Ok(())
    }
}
