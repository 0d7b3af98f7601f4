//! Account management module
//!
//! PostgreSQL-based storage for currency-scoped client balances.

pub mod models;
pub mod repository;

pub use models::{Account, AccountUpdate, BalanceUpdate};
pub use repository::AccountStore;
