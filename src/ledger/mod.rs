//! Transaction ledger
//!
//! Append-only record of every balance-affecting or attempted event. Rows are
//! inserted once and never updated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::Row;
use sqlx::postgres::{PgConnection, PgRow};
use std::fmt;

use crate::core_types::{AccountId, ClientId, MethodId, TransId};
use crate::error::{ServiceError, ServiceResult};
use crate::method::registry::row_to_method;
use crate::method::{Method, MethodPayload};

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i16)]
pub enum TransStatus {
    Success = 0,
    Failed = 1,
}

impl TransStatus {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransStatus::Success),
            1 => Some(TransStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransStatus::Success => write!(f, "success"),
            TransStatus::Failed => write!(f, "failed"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Immutable ledger entry. `value` is signed: deposits positive, withdrawals
/// negative. Failed entries carry the attempted value and never affect balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trans {
    pub id: TransId,
    pub method: MethodId,
    pub account: AccountId,
    pub value: Decimal,
    pub time: DateTime<Utc>,
    pub status: TransStatus,
    pub status_reason: Option<String>,
}

impl Trans {
    fn from_row(row: &PgRow) -> ServiceResult<Self> {
        let status_id: i16 = row.try_get("status")?;
        let status = TransStatus::from_id(status_id)
            .ok_or_else(|| ServiceError::Internal(format!("unknown trans status {}", status_id)))?;
        Ok(Self {
            id: row.try_get("id")?,
            method: row.try_get("method")?,
            account: row.try_get("account")?,
            value: row.try_get("value")?,
            time: row.try_get("time")?,
            status,
            status_reason: row.try_get("status_reason")?,
        })
    }
}

/// Transaction with its decoded method, as shown in account history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub trans: Trans,
    pub method: Method,
}

// ============================================================================
// Ledger
// ============================================================================

pub struct TransactionLedger;

impl TransactionLedger {
    /// Insert one transaction. Anything other than exactly one inserted row is
    /// an error.
    pub async fn append(
        conn: &mut PgConnection,
        status: TransStatus,
        account: AccountId,
        method: MethodId,
        value: Decimal,
        reason: Option<&str>,
    ) -> ServiceResult<Trans> {
        let rows = sqlx::query(
            r#"INSERT INTO trans (method, account, value, time, status, status_reason)
               VALUES ($1, $2, $3, NOW(), $4, $5)
               RETURNING id, method, account, value, time, status, status_reason"#,
        )
        .bind(method)
        .bind(account)
        .bind(value)
        .bind(status.id())
        .bind(reason)
        .fetch_all(conn)
        .await?;

        if rows.len() != 1 {
            return Err(ServiceError::Internal(format!(
                "trans insert affected {} rows instead of 1",
                rows.len()
            )));
        }
        Trans::from_row(&rows[0])
    }

    /// Transactions of an account with their methods, newest first
    pub async fn history(
        conn: &mut PgConnection,
        account: AccountId,
    ) -> ServiceResult<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.method, t.account, t.value, t.time, t.status, t.status_reason,
                      m.id AS method_id, m.client AS method_client, m.type AS method_type,
                      m.payload AS method_payload, m.currency AS method_currency
               FROM trans t
               JOIN method m ON m.id = t.method
               WHERE t.account = $1
               ORDER BY t.time DESC, t.id DESC"#,
        )
        .bind(account)
        .fetch_all(conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(HistoryEntry {
                    trans: Trans::from_row(row)?,
                    method: row_to_method(row, "method_")?,
                })
            })
            .collect()
    }
}

/// One log line per committed transaction
pub fn log_committed(trans: &Trans, client: ClientId, method: &MethodPayload) {
    tracing::info!(
        trans_id = trans.id,
        status = %trans.status,
        method_id = %trans.method,
        method_type = method.method_type().name(),
        method_name = %method.display_name(),
        value = %trans.value,
        client = %client,
        account = %trans.account,
        reason = trans.status_reason.as_deref().unwrap_or(""),
        "Trans committed"
    );
}
