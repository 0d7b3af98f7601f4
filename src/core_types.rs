//! Core types used throughout the system
//!
//! Identifiers are UUID newtypes so a `ClientId` can never be passed where an
//! `AccountId` is expected. All of them are stored as PostgreSQL `UUID`.
//! Transaction ids are the only sequential ids (`BIGSERIAL`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s.trim())?))
            }
        }
    };
}

uuid_id!(
    /// Client ID - primary key of `client`
    ClientId
);

uuid_id!(
    /// Account ID - primary key of `account`
    AccountId
);

uuid_id!(
    /// Method ID - primary key of `method`
    MethodId
);

uuid_id!(
    /// Opaque bearer credential. The value itself is the primary key of
    /// `session_token`, there is no separate surrogate id.
    SessionToken
);

uuid_id!(
    /// Confirmation ID - primary key of `client_confirmation`
    ConfirmationId
);

/// Transaction ID - sequential, assigned by the store
pub type TransId = i64;

/// Per-account revision counter. Starts at 1, +1 per committed balance change.
pub type Revision = i64;
