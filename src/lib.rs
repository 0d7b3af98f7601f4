//! Elefantpay - payment-account backend
//!
//! Clients hold currency accounts, move money through typed payment methods
//! and authenticate with rotating bearer tokens obtained through a 2FA
//! email confirmation.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier newtypes (ClientId, AccountId, etc.)
//! - [`account`] - Account storage, balance deltas and change polling
//! - [`method`] - Payment method payloads and the dedup registry
//! - [`ledger`] - Append-only transaction ledger
//! - [`balance`] - Deposit, withdrawal, transfer and tax payment
//! - [`session`] - Rotating session tokens
//! - [`confirmation`] - 2FA login confirmation
//! - [`api`] - Named operations over transport-neutral requests

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

// Storage
pub mod db;

// Domain
pub mod account;
pub mod balance;
pub mod client;
pub mod confirmation;
pub mod ledger;
pub mod method;
pub mod session;

// Collaborators
pub mod credentials;
pub mod email;

pub mod api;

// Convenient re-exports at crate root
pub use core_types::{AccountId, ClientId, ConfirmationId, MethodId, Revision, SessionToken, TransId};
pub use error::{ErrorKind, ServiceError, ServiceResult};
