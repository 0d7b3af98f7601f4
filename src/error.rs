//! Service error taxonomy
//!
//! Every public operation returns `ServiceError`. The variants fall into five
//! kinds (see [`ErrorKind`]) which tell the caller whether a retry is safe and
//! whether the process may keep serving.

use thiserror::Error;

use crate::core_types::{AccountId, MethodId};
use crate::method::MethodError;
use crate::validation::{Currency, ValidationError};

/// Error classification for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any storage mutation
    Validation,
    /// Unknown entity; idempotent to retry
    NotFound,
    /// Uniqueness violation or rate limit
    Conflict,
    /// Connection-level failure; everything rolled back, retry the whole operation
    Transient,
    /// Rollback itself failed; transaction state is unknown
    Fatal,
    /// Any other store or codec failure
    Internal,
}

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    // === Validation Errors ===
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error("Account-sender has currency {from}, but account-receiver has {to}")]
    CurrencyMismatch { from: Currency, to: Currency },

    #[error("Invalid Authorization header format")]
    InvalidBearer,

    // === Not Found ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Method not found: {0}")]
    MethodNotFound(MethodId),

    #[error("Client not found")]
    ClientNotFound,

    #[error("Confirmation not found or expired")]
    ConfirmationNotFound,

    #[error("Unknown or expired session token")]
    SessionNotFound,

    #[error("Invalid email or password")]
    InvalidCredentials,

    // === Conflicts ===
    #[error("Email already used: {0}")]
    EmailTaken(String),

    #[error("Uniqueness violation: {0}")]
    Conflict(String),

    #[error("Confirmation was issued recently, retry later")]
    ConfirmationCooldown,

    // === Store / Codec ===
    #[error("{0}")]
    Method(#[from] MethodError),

    #[error("Failed to allocate confirmation ID after {0} attempts")]
    ConfirmationIdExhausted(usize),

    #[error("Store unavailable: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Transaction state unknown: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_)
            | ServiceError::SameAccount
            | ServiceError::CurrencyMismatch { .. }
            | ServiceError::InvalidBearer => ErrorKind::Validation,
            ServiceError::AccountNotFound(_)
            | ServiceError::MethodNotFound(_)
            | ServiceError::ClientNotFound
            | ServiceError::ConfirmationNotFound
            | ServiceError::SessionNotFound
            | ServiceError::InvalidCredentials => ErrorKind::NotFound,
            ServiceError::EmailTaken(_)
            | ServiceError::Conflict(_)
            | ServiceError::ConfirmationCooldown => ErrorKind::Conflict,
            ServiceError::Transient(_) => ErrorKind::Transient,
            ServiceError::Fatal(_) => ErrorKind::Fatal,
            ServiceError::Method(_)
            | ServiceError::ConfirmationIdExhausted(_)
            | ServiceError::Database(_)
            | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "INVALID_PARAM",
            ServiceError::SameAccount => "SAME_ACCOUNT",
            ServiceError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            ServiceError::InvalidBearer => "INVALID_BEARER",
            ServiceError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ServiceError::MethodNotFound(_) => "METHOD_NOT_FOUND",
            ServiceError::ClientNotFound => "CLIENT_NOT_FOUND",
            ServiceError::ConfirmationNotFound => "CONFIRMATION_NOT_FOUND",
            ServiceError::SessionNotFound => "UNAUTHORIZED",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::EmailTaken(_) => "EMAIL_TAKEN",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::ConfirmationCooldown => "CONFIRMATION_COOLDOWN",
            ServiceError::Method(_) => "METHOD_ERROR",
            ServiceError::ConfirmationIdExhausted(_) => "CONFIRMATION_ID_EXHAUSTED",
            ServiceError::Transient(_) => "SERVICE_UNAVAILABLE",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Internal(_) => "SYSTEM_ERROR",
            ServiceError::Fatal(_) => "FATAL",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::SessionNotFound => 401,
            ServiceError::AccountNotFound(_)
            | ServiceError::MethodNotFound(_)
            | ServiceError::ClientNotFound
            | ServiceError::ConfirmationNotFound
            | ServiceError::InvalidCredentials => 404,
            ServiceError::ConfirmationCooldown => 429,
            ServiceError::EmailTaken(_) | ServiceError::Conflict(_) => 409,
            ServiceError::Transient(_) => 503,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                _ => 500,
            },
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            // serialization_failure, deadlock_detected: the store aborted the
            // transaction, the whole operation can be retried
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) =>
            {
                ServiceError::Transient(e.to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => ServiceError::Transient(e.to_string()),
            _ => ServiceError::Database(e.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
