//! Payment methods
//!
//! A method is the instrument on the other side of a transaction: the card a
//! deposit came from, the account a transfer went to, the tax bill paid.

pub mod registry;
pub mod types;

pub use registry::MethodRegistry;
pub use types::{BankCard, LinkedAccount, Method, MethodError, MethodPayload, MethodType, TaxBill};
