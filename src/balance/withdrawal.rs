use rust_decimal::Decimal;

use crate::account::{Account, BalanceUpdate};
use crate::core_types::ClientId;
use crate::db::StoreTx;
use crate::error::ServiceResult;
use crate::ledger::Trans;
use crate::validation::Amount;

/// Reason recorded on a declined withdrawal
pub const INSUFFICIENT_FUNDS: &str = "insufficient funds";

/// Debit applied inside an open transaction, not yet judged.
///
/// Owns the transaction: finalizing either hands it back with the debit
/// recorded, or rolls it back.
pub struct WithdrawalAttempt {
    pub(crate) tx: StoreTx,
    pub(crate) update: BalanceUpdate,
    pub(crate) client: ClientId,
    pub(crate) amount: Amount,
}

impl WithdrawalAttempt {
    /// Balance after the tentative debit
    pub fn account(&self) -> &Account {
        &self.update.account
    }

    pub fn is_overdrawn(&self) -> bool {
        self.update.account.balance < Decimal::ZERO
    }

    /// Roll the attempt back without recording anything
    pub async fn abandon(self) -> ServiceResult<()> {
        self.tx.rollback().await
    }
}

/// Finalized withdrawal
pub enum Withdrawal {
    /// Debit and its Success transaction are staged in `tx`; the caller commits
    Applied {
        tx: StoreTx,
        trans: Trans,
        sender: BalanceUpdate,
    },
    /// The debit was rolled back and a Failed transaction committed on its own
    Declined(Trans),
}

/// Result of a complete payment operation
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// All legs committed, in order (sender leg first for transfers)
    Completed(Vec<Trans>),
    /// Nothing moved; the committed Failed transaction on the debited account
    Declined(Trans),
}

impl PaymentOutcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, PaymentOutcome::Declined(_))
    }
}
