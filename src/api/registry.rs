//! Operation name to handler table

use thiserror::Error;

use super::Operation;
use super::account::{
    AccountCreate, AccountDeposit, AccountInfo, AccountList, AccountPaymentTax,
    AccountPaymentToAccount,
};
use super::client::{ClientConfirm, ClientCreate, ClientLogin, ClientLogout, ClientLogoutAll};

pub type OperationFactory = fn() -> Box<dyn Operation>;

#[derive(Debug, Error, PartialEq)]
#[error("Failed to find operation with name \"{0}\"")]
pub struct UnknownOperation(pub String);

pub static OPERATIONS: &[(&str, OperationFactory)] = &[
    ("ClientCreate", || Box::new(ClientCreate)),
    ("ClientLogin", || Box::new(ClientLogin)),
    ("ClientConfirm", || Box::new(ClientConfirm)),
    ("ClientLogout", || Box::new(ClientLogout)),
    ("ClientLogoutAll", || Box::new(ClientLogoutAll)),
    ("AccountCreate", || Box::new(AccountCreate)),
    ("AccountList", || Box::new(AccountList)),
    ("AccountInfo", || Box::new(AccountInfo)),
    ("AccountDeposit", || Box::new(AccountDeposit)),
    ("AccountPaymentToAccount", || Box::new(AccountPaymentToAccount)),
    ("AccountPaymentTax", || Box::new(AccountPaymentTax)),
];

pub fn find(name: &str) -> Option<OperationFactory> {
    OPERATIONS
        .iter()
        .find(|(op, _)| *op == name)
        .map(|(_, factory)| *factory)
}

pub fn create(name: &str) -> Result<Box<dyn Operation>, UnknownOperation> {
    find(name)
        .map(|factory| factory())
        .ok_or_else(|| UnknownOperation(name.to_string()))
}

pub fn names() -> impl Iterator<Item = &'static str> {
    OPERATIONS.iter().map(|(name, _)| *name)
}
