//! Account storage
//!
//! Balance changes are single `UPDATE ... RETURNING` statements: the new
//! balance and revision are computed by the store, never read and written back.

use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::postgres::PgConnection;

use super::models::{Account, AccountUpdate, BalanceUpdate};
use crate::core_types::{AccountId, ClientId, Revision};
use crate::error::{ServiceError, ServiceResult};
use crate::ledger::TransactionLedger;
use crate::validation::Currency;

const ACCOUNT_COLUMNS: &str = "a.id, a.client, a.currency, a.balance, a.revision";

pub struct AccountStore;

impl AccountStore {
    /// Open an account with balance 0 and revision 1
    pub async fn create(
        conn: &mut PgConnection,
        client: ClientId,
        currency: &Currency,
    ) -> ServiceResult<Account> {
        let row = sqlx::query(
            r#"INSERT INTO account AS a (id, client, currency, balance, revision)
               VALUES ($1, $2, $3, 0, 1)
               RETURNING a.id, a.client, a.currency, a.balance, a.revision"#,
        )
        .bind(AccountId::new())
        .bind(client)
        .bind(currency.as_str())
        .fetch_one(conn)
        .await?;

        Account::from_row(&row)
    }

    /// All accounts of a client
    pub async fn list(conn: &mut PgConnection, client: ClientId) -> ServiceResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM account a WHERE a.client = $1 ORDER BY a.currency, a.id",
            ACCOUNT_COLUMNS
        ))
        .bind(client)
        .fetch_all(conn)
        .await?;

        rows.iter().map(Account::from_row).collect()
    }

    /// Account by id, only if `client` owns it
    pub async fn get_owned(
        conn: &mut PgConnection,
        id: AccountId,
        client: ClientId,
    ) -> ServiceResult<Account> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM account a WHERE a.id = $1 AND a.client = $2",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(client)
        .fetch_optional(conn)
        .await?;

        match row {
            Some(row) => Account::from_row(&row),
            None => Err(ServiceError::AccountNotFound(id)),
        }
    }

    /// Add signed `delta` to an account owned by `client`, bumping revision.
    ///
    /// Returns `None` when the account does not exist or belongs to someone
    /// else. A negative resulting balance is returned as is: deciding about it
    /// is the caller's job, inside the same transaction.
    pub async fn apply_owned_delta(
        conn: &mut PgConnection,
        id: AccountId,
        client: ClientId,
        delta: Decimal,
    ) -> ServiceResult<Option<BalanceUpdate>> {
        let row = sqlx::query(&format!(
            r#"UPDATE account AS a
               SET balance = a.balance + $3, revision = a.revision + 1
               FROM client AS c
               WHERE a.id = $1 AND a.client = $2 AND c.id = a.client
               RETURNING {}, c.email"#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(client)
        .bind(delta)
        .fetch_optional(conn)
        .await?;

        row.map(|row| Self::row_to_update(&row)).transpose()
    }

    /// Add signed `delta` to any account, bumping revision. Used for the
    /// receiving leg of a transfer, where the caller does not own the account.
    pub async fn credit(
        conn: &mut PgConnection,
        id: AccountId,
        delta: Decimal,
    ) -> ServiceResult<Option<BalanceUpdate>> {
        let row = sqlx::query(&format!(
            r#"UPDATE account AS a
               SET balance = a.balance + $2, revision = a.revision + 1
               FROM client AS c
               WHERE a.id = $1 AND c.id = a.client
               RETURNING {}, c.email"#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(conn)
        .await?;

        row.map(|row| Self::row_to_update(&row)).transpose()
    }

    /// Account and its history if it changed after `from_revision`.
    ///
    /// `Ok(None)` means nothing new; the comparison is `>` so gaps in the
    /// caller's watermark are harmless.
    pub async fn find_update(
        conn: &mut PgConnection,
        id: AccountId,
        client: ClientId,
        from_revision: Revision,
    ) -> ServiceResult<Option<AccountUpdate>> {
        let account = Self::get_owned(&mut *conn, id, client).await?;
        if account.revision <= from_revision {
            return Ok(None);
        }
        let history = TransactionLedger::history(&mut *conn, id).await?;
        Ok(Some(AccountUpdate { account, history }))
    }

    fn row_to_update(row: &sqlx::postgres::PgRow) -> ServiceResult<BalanceUpdate> {
        Ok(BalanceUpdate {
            account: Account::from_row(row)?,
            owner_email: row.try_get("email")?,
        })
    }
}
