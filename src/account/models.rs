//! Account data models

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::core_types::{AccountId, ClientId, Revision};
use crate::error::ServiceResult;
use crate::ledger::HistoryEntry;
use crate::validation::Currency;

/// Currency-scoped balance owned by a client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub client: ClientId,
    pub currency: Currency,
    /// Sum of the account's successful transaction values
    pub balance: Decimal,
    /// +1 per committed balance change, starts at 1
    pub revision: Revision,
}

impl Account {
    pub(crate) fn from_row(row: &PgRow) -> ServiceResult<Self> {
        let currency: String = row.try_get("currency")?;
        Ok(Self {
            id: row.try_get("id")?,
            client: row.try_get("client")?,
            currency: Currency::new(&currency)?,
            balance: row.try_get("balance")?,
            revision: row.try_get("revision")?,
        })
    }
}

/// Result of an atomic balance update, with the owner's email for the
/// counterparty method of a transfer
#[derive(Debug, Clone)]
pub struct BalanceUpdate {
    pub account: Account,
    pub owner_email: String,
}

/// Account state newer than a caller's watermark
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub account: Account,
    pub history: Vec<HistoryEntry>,
}
