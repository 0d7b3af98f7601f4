//! Input validation for client and money inputs
//!
//! Validated newtypes keep their fields private so every value that reaches the
//! store went through `new()`. Everything here runs before a transaction is
//! opened: a `ValidationError` never leaves a partial write behind.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidateEmail;

// ============================================================================
// Validation Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("Amount must be positive: got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Amount {value} has more than {max_scale} decimal places")]
    AmountTooPrecise { value: Decimal, max_scale: u32 },

    #[error("Amount {0} exceeds the storable range")]
    AmountTooLarge(Decimal),

    #[error("Email has invalid format: '{0}'")]
    InvalidEmail(String),

    #[error("Password could not be shorter than {min} symbols (got {actual})")]
    PasswordTooShort { min: usize, actual: usize },

    #[error("Invalid length for {field}: expected {min}-{max}, got {actual}")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid {field} ID: '{value}'")]
    InvalidId { field: &'static str, value: String },

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Request is not valid JSON object: {0}")]
    InvalidBody(String),
}

// ============================================================================
// Currency
// ============================================================================

/// Currency tag (ISO 4217 shaped: three uppercase letters).
///
/// The tag is opaque: two accounts can only exchange money when their tags
/// are equal, nothing ever converts between them.
///
/// ```
/// use elefantpay::validation::Currency;
///
/// let eur = Currency::new("EUR").unwrap();
/// assert_eq!(eur.as_str(), "EUR");
/// assert!(Currency::new("eur").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(iso: &str) -> Result<Self, ValidationError> {
        let iso = iso.trim();
        if iso.len() != 3 {
            return Err(ValidationError::InvalidLength {
                field: "currency",
                min: 3,
                max: 3,
                actual: iso.len(),
            });
        }
        if !iso.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency",
                value: iso.to_string(),
                expected: "three uppercase letters",
            });
        }
        Ok(Self(iso.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Total digits of a stored money column, `NUMERIC(MONEY_PRECISION, MONEY_SCALE)`
pub const MONEY_PRECISION: u32 = 30;
/// Decimal places of a stored money column
pub const MONEY_SCALE: u32 = 8;

/// Strictly positive money amount. Direction (credit/debit) is decided by the
/// operation, never by the sign of the input.
///
/// Must fit the money columns exactly: at most `MONEY_SCALE` decimal places and
/// below `10^(MONEY_PRECISION - MONEY_SCALE)`, so the store never rounds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(value));
        }
        if value.normalize().scale() > MONEY_SCALE {
            return Err(ValidationError::AmountTooPrecise {
                value,
                max_scale: MONEY_SCALE,
            });
        }
        if value >= Self::limit() {
            return Err(ValidationError::AmountTooLarge(value));
        }
        Ok(Self(value))
    }

    /// First value the money columns cannot hold
    fn limit() -> Decimal {
        Decimal::from_i128_with_scale(10i128.pow(MONEY_PRECISION - MONEY_SCALE), 0)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Client credentials
// ============================================================================

/// Syntactically valid email address (trimmed). Uniqueness is
/// case-insensitive and enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub fn new(email: &str) -> Result<Self, ValidationError> {
        let email = email.trim();
        if !email.validate_email() {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        Ok(Self(email.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plaintext password that passed the length policy. Never printed.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: &str, min_len: usize) -> Result<Self, ValidationError> {
        let actual = password.chars().count();
        if actual < min_len {
            return Err(ValidationError::PasswordTooShort {
                min: min_len,
                actual,
            });
        }
        Ok(Self(password.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password(***)")
    }
}

/// Display name of a client, 1-128 characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientName(String);

impl ClientName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > 128 {
            return Err(ValidationError::InvalidLength {
                field: "name",
                min: 1,
                max: 128,
                actual: len,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parse an id argument, reporting which field was malformed
pub fn parse_id<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ValidationError> {
    value.parse().map_err(|_| ValidationError::InvalidId {
        field,
        value: value.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
