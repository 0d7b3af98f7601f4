//! Method registration and lookup

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::Row;

use crate::account::Account;
use crate::core_types::{ClientId, MethodId};
use crate::error::{ServiceError, ServiceResult};
use crate::validation::Currency;

use super::types::{Method, MethodPayload, MethodType};

/// Registry of funding/receiving instruments, deduplicated per
/// `(client, type, key)`.
pub struct MethodRegistry;

impl MethodRegistry {
    /// Register the instrument for `account` or return the id of the row that
    /// already carries the same dedup key.
    ///
    /// One statement: a key conflict updates nothing of substance and still
    /// returns the existing id, so it never aborts the surrounding transaction.
    ///
    /// The dedup key is (owner, type, key) and leaves currency out: a card
    /// used on a second account of another currency resolves to the first row,
    /// which keeps the currency it was registered with.
    pub async fn resolve(
        conn: &mut PgConnection,
        account: &Account,
        payload: &MethodPayload,
    ) -> ServiceResult<MethodId> {
        let client = Self::owner(account, payload);
        let payload_json = payload.encode()?;

        let row = sqlx::query(
            r#"INSERT INTO method (id, client, type, payload, currency, key)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT ON CONSTRAINT method_dedup_key
               DO UPDATE SET key = EXCLUDED.key
               RETURNING id"#,
        )
        .bind(MethodId::new())
        .bind(client)
        .bind(payload.method_type().id())
        .bind(payload_json)
        .bind(account.currency.as_str())
        .bind(payload.key())
        .fetch_one(conn)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// Load one method
    pub async fn get(conn: &mut PgConnection, id: MethodId) -> ServiceResult<Method> {
        let row = sqlx::query(
            r#"SELECT id, client, type, payload, currency FROM method WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        match row {
            Some(row) => row_to_method(&row, ""),
            None => Err(ServiceError::MethodNotFound(id)),
        }
    }

    /// Tax methods are shared by every payer of a bill and have no owner
    fn owner(account: &Account, payload: &MethodPayload) -> Option<ClientId> {
        match payload.method_type() {
            MethodType::Tax => None,
            MethodType::BankCard | MethodType::AccountTransfer => Some(account.client),
        }
    }
}

/// Decode a method from a row. `prefix` selects aliased columns when the
/// method is joined into another query (`method_id`, `method_type`, ...).
pub(crate) fn row_to_method(row: &PgRow, prefix: &str) -> ServiceResult<Method> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let type_id: i16 = row.try_get(col("type").as_str())?;
    let payload: serde_json::Value = row.try_get(col("payload").as_str())?;
    let currency: String = row.try_get(col("currency").as_str())?;
    Ok(Method {
        id: row.try_get(col("id").as_str())?,
        client: row.try_get(col("client").as_str())?,
        currency: Currency::new(&currency)?,
        payload: MethodPayload::decode(type_id, payload)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::AccountId;
    use crate::method::types::{BankCard, TaxBill};
    use rust_decimal::Decimal;

    fn account() -> Account {
        Account {
            id: AccountId::new(),
            client: ClientId::new(),
            currency: Currency::new("EUR").unwrap(),
            balance: Decimal::ZERO,
            revision: 1,
        }
    }

    #[test]
    fn test_tax_method_has_no_owner() {
        let acc = account();
        let tax = MethodPayload::Tax(TaxBill {
            bill: "B-1".to_string(),
        });
        assert_eq!(MethodRegistry::owner(&acc, &tax), None);
    }

    #[test]
    fn test_card_method_owned_by_account_client() {
        let acc = account();
        let card = MethodPayload::BankCard(BankCard {
            number: 5500000000000004,
            valid_thru_month: 1,
            valid_thru_year: 2031,
            cvc: "321".to_string(),
        });
        assert_eq!(MethodRegistry::owner(&acc, &card), Some(acc.client));
    }
}
