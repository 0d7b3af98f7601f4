use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::ConfirmationId;
use crate::validation::ValidationError;

const CODE_LIMIT: u32 = 1_000_000;

/// Six-digit 2FA code. Leading zeros are significant only for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ConfirmationCode(u32);

impl ConfirmationCode {
    pub fn new(code: u32) -> Result<Self, ValidationError> {
        if code >= CODE_LIMIT {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                value: code.to_string(),
                expected: "six digits",
            });
        }
        Ok(Self(code))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Persisted as `INTEGER`
    pub(crate) fn as_i32(&self) -> i32 {
        // < 1_000_000, always fits
        self.0 as i32
    }
}

impl TryFrom<u32> for ConfirmationCode {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConfirmationCode> for u32 {
    fn from(value: ConfirmationCode) -> Self {
        value.0
    }
}

impl FromStr for ConfirmationCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValidationError::InvalidFormat {
            field: "code",
            value: s.to_string(),
            expected: "six digits",
        };
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        Self::new(s.parse().map_err(|_| invalid())?)
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Source of confirmation ids and codes
pub trait ConfirmationGenerator: Send + Sync {
    fn next_id(&self) -> ConfirmationId;
    fn next_code(&self) -> ConfirmationCode;
}

/// Random v4 ids and uniformly distributed codes
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomConfirmationGenerator;

impl ConfirmationGenerator for RandomConfirmationGenerator {
    fn next_id(&self) -> ConfirmationId {
        ConfirmationId::new()
    }

    fn next_code(&self) -> ConfirmationCode {
        ConfirmationCode(rand::thread_rng().gen_range(0..CODE_LIMIT))
    }
}
