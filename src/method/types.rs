//! Method variants and their persisted form

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{AccountId, ClientId, MethodId};
use crate::validation::Currency;

// ============================================================================
// Method Type
// ============================================================================

/// Persisted discriminator of a method variant (`method.type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum MethodType {
    BankCard = 0,
    AccountTransfer = 1,
    Tax = 2,
}

impl MethodType {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Result<Self, MethodError> {
        match id {
            0 => Ok(MethodType::BankCard),
            1 => Ok(MethodType::AccountTransfer),
            2 => Ok(MethodType::Tax),
            _ => Err(MethodError::UnknownMethodType(id)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MethodType::BankCard => "bank card",
            MethodType::AccountTransfer => "account",
            MethodType::Tax => "tax",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MethodError {
    #[error("Method type \"{0}\" is unknown")]
    UnknownMethodType(i16),

    #[error("Failed to decode {method_type} method payload: {reason}")]
    Payload {
        method_type: &'static str,
        reason: String,
    },
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCard {
    #[serde(rename = "n")]
    pub number: u64,
    #[serde(rename = "m")]
    pub valid_thru_month: u8,
    #[serde(rename = "y")]
    pub valid_thru_year: u16,
    #[serde(rename = "c")]
    pub cvc: String,
}

/// Counterparty of an account-to-account payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    #[serde(rename = "a")]
    pub account: AccountId,
    /// Email of the counterparty's owner, shown as the method name
    #[serde(rename = "e")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBill {
    #[serde(rename = "b")]
    pub bill: String,
}

/// Type-specific part of a method. The variant is stored in `method.type`,
/// the fields in `method.payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodPayload {
    BankCard(BankCard),
    AccountTransfer(LinkedAccount),
    Tax(TaxBill),
}

impl MethodPayload {
    pub fn method_type(&self) -> MethodType {
        match self {
            MethodPayload::BankCard(_) => MethodType::BankCard,
            MethodPayload::AccountTransfer(_) => MethodType::AccountTransfer,
            MethodPayload::Tax(_) => MethodType::Tax,
        }
    }

    /// Dedup key, unique per (client, type)
    pub fn key(&self) -> String {
        match self {
            MethodPayload::BankCard(card) => format!(
                "|{}|{}|{}|{}|",
                card.number, card.valid_thru_month, card.valid_thru_year, card.cvc
            ),
            MethodPayload::AccountTransfer(link) => link.account.to_string(),
            MethodPayload::Tax(tax) => tax.bill.clone(),
        }
    }

    /// Human-readable name, never exposes a full card number
    pub fn display_name(&self) -> String {
        match self {
            MethodPayload::BankCard(card) => {
                format!("{} {}", MethodType::BankCard.name(), mask_card_number(card.number))
            }
            MethodPayload::AccountTransfer(link) => link.email.clone(),
            MethodPayload::Tax(tax) => format!("tax bill \"{}\"", tax.bill),
        }
    }

    pub fn encode(&self) -> Result<serde_json::Value, MethodError> {
        let encoded = match self {
            MethodPayload::BankCard(card) => serde_json::to_value(card),
            MethodPayload::AccountTransfer(link) => serde_json::to_value(link),
            MethodPayload::Tax(tax) => serde_json::to_value(tax),
        };
        encoded.map_err(|e| MethodError::Payload {
            method_type: self.method_type().name(),
            reason: e.to_string(),
        })
    }

    /// Rebuild a payload from its discriminator and stored JSON
    pub fn decode(type_id: i16, payload: serde_json::Value) -> Result<Self, MethodError> {
        let method_type = MethodType::from_id(type_id)?;
        let err = |e: serde_json::Error| MethodError::Payload {
            method_type: method_type.name(),
            reason: e.to_string(),
        };
        Ok(match method_type {
            MethodType::BankCard => MethodPayload::BankCard(serde_json::from_value(payload).map_err(err)?),
            MethodType::AccountTransfer => {
                MethodPayload::AccountTransfer(serde_json::from_value(payload).map_err(err)?)
            }
            MethodType::Tax => MethodPayload::Tax(serde_json::from_value(payload).map_err(err)?),
        })
    }
}

fn mask_card_number(number: u64) -> String {
    let digits = number.to_string();
    let len = digits.len();
    if len > 8 {
        format!("{} ... {}", &digits[..4], &digits[len - 4..])
    } else if len > 2 {
        format!("{} ... {}", &digits[..1], &digits[len - 1..])
    } else {
        digits
    }
}

// ============================================================================
// Method
// ============================================================================

/// Funding or receiving instrument behind a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub id: MethodId,
    /// `None` for tax methods, which are shared by every payer of a bill
    pub client: Option<ClientId>,
    /// Currency of the account the method was first used with. Dedup ignores
    /// it, so later uses from other currencies share this row unchanged.
    pub currency: Currency,
    pub payload: MethodPayload,
}

impl Method {
    pub fn method_type(&self) -> MethodType {
        self.payload.method_type()
    }

    pub fn display_name(&self) -> String {
        self.payload.display_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card() -> BankCard {
        BankCard {
            number: 4111111111111111,
            valid_thru_month: 12,
            valid_thru_year: 2030,
            cvc: "123".to_string(),
        }
    }

    #[test]
    fn test_method_type_ids() {
        for t in [MethodType::BankCard, MethodType::AccountTransfer, MethodType::Tax] {
            assert_eq!(MethodType::from_id(t.id()).unwrap(), t);
        }
        assert_eq!(MethodType::BankCard.id(), 0);
        assert_eq!(MethodType::AccountTransfer.id(), 1);
        assert_eq!(MethodType::Tax.id(), 2);
    }

    #[test]
    fn test_unknown_method_type_rejected() {
        assert_eq!(
            MethodType::from_id(3).unwrap_err(),
            MethodError::UnknownMethodType(3)
        );
        assert!(MethodType::from_id(-1).is_err());
        assert!(MethodPayload::decode(7, json!({})).is_err());
    }

    #[test]
    fn test_card_key_and_name() {
        let payload = MethodPayload::BankCard(card());
        assert_eq!(payload.key(), "|4111111111111111|12|2030|123|");
        assert_eq!(payload.display_name(), "bank card 4111 ... 1111");
        assert_eq!(payload.method_type(), MethodType::BankCard);
    }

    #[test]
    fn test_short_card_number_masking() {
        assert_eq!(mask_card_number(12345), "1 ... 5");
        assert_eq!(mask_card_number(12), "12");
    }

    #[test]
    fn test_same_card_same_key() {
        let a = MethodPayload::BankCard(card());
        let mut other = card();
        assert_eq!(a.key(), MethodPayload::BankCard(other.clone()).key());
        other.cvc = "999".to_string();
        assert_ne!(a.key(), MethodPayload::BankCard(other).key());
    }

    #[test]
    fn test_account_and_tax_keys() {
        let account = AccountId::new();
        let link = MethodPayload::AccountTransfer(LinkedAccount {
            account,
            email: "bob@example.com".to_string(),
        });
        assert_eq!(link.key(), account.to_string());
        assert_eq!(link.display_name(), "bob@example.com");

        let tax = MethodPayload::Tax(TaxBill {
            bill: "2024-Q1".to_string(),
        });
        assert_eq!(tax.key(), "2024-Q1");
        assert_eq!(tax.display_name(), "tax bill \"2024-Q1\"");
    }

    #[test]
    fn test_card_payload_wire_format() {
        let encoded = MethodPayload::BankCard(card()).encode().unwrap();
        assert_eq!(
            encoded,
            json!({"n": 4111111111111111u64, "m": 12, "y": 2030, "c": "123"})
        );
        let decoded = MethodPayload::decode(MethodType::BankCard.id(), encoded).unwrap();
        assert_eq!(decoded, MethodPayload::BankCard(card()));
    }

    #[test]
    fn test_decode_dispatches_on_discriminator() {
        // A tax payload stored under the card discriminator must not decode
        let tax = MethodPayload::Tax(TaxBill {
            bill: "X".to_string(),
        })
        .encode()
        .unwrap();
        let err = MethodPayload::decode(MethodType::BankCard.id(), tax.clone()).unwrap_err();
        assert!(matches!(err, MethodError::Payload { method_type: "bank card", .. }));
        assert!(matches!(
            MethodPayload::decode(MethodType::Tax.id(), tax).unwrap(),
            MethodPayload::Tax(_)
        ));
    }
}
