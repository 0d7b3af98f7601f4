//! Balance mutations
//!
//! Every operation here is one store transaction that changes the balance,
//! resolves the method and appends the ledger row together, so the sum of an
//! account's Success transactions always equals its balance.
//!
//! A withdrawal that would overdraw the account is applied tentatively, then
//! rolled back; the Failed transaction is written by a second, independent
//! transaction that never touches the balance.

mod withdrawal;

pub use withdrawal::{INSUFFICIENT_FUNDS, PaymentOutcome, Withdrawal, WithdrawalAttempt};

use rust_decimal::Decimal;

use crate::account::{Account, AccountStore};
use crate::core_types::{AccountId, ClientId};
use crate::db::{Database, StoreTx};
use crate::error::{ServiceError, ServiceResult};
use crate::ledger::{self, Trans, TransStatus, TransactionLedger};
use crate::method::{BankCard, LinkedAccount, MethodPayload, MethodRegistry, TaxBill};
use crate::validation::Amount;

#[derive(Clone)]
pub struct BalanceMutator {
    db: Database,
}

impl BalanceMutator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Credit `account` from a card
    pub async fn deposit(
        &self,
        account: AccountId,
        client: ClientId,
        card: BankCard,
        amount: Amount,
    ) -> ServiceResult<Trans> {
        let mut tx = self.db.begin().await?;

        let update = AccountStore::apply_owned_delta(tx.conn(), account, client, amount.value())
            .await?
            .ok_or(ServiceError::AccountNotFound(account))?;

        let payload = MethodPayload::BankCard(card);
        let trans = Self::record_success(&mut tx, &update.account, &payload, amount.value()).await?;
        tx.commit().await?;

        ledger::log_committed(&trans, client, &payload);
        Ok(trans)
    }

    /// Apply `-amount` to an account owned by `client` inside `tx`.
    ///
    /// The new balance comes back from the same statement that changed it; it
    /// may be negative until the attempt is finalized.
    pub async fn attempt_withdraw(
        mut tx: StoreTx,
        account: AccountId,
        client: ClientId,
        amount: Amount,
    ) -> ServiceResult<WithdrawalAttempt> {
        let update = AccountStore::apply_owned_delta(tx.conn(), account, client, -amount.value())
            .await?
            .ok_or(ServiceError::AccountNotFound(account))?;

        Ok(WithdrawalAttempt {
            tx,
            update,
            client,
            amount,
        })
    }

    /// Keep or discard an attempted withdrawal.
    ///
    /// Overdrawn: roll back the attempt's transaction, including anything else
    /// staged in it, and commit a Failed transaction in a fresh one.
    /// Otherwise: stage the Success transaction and return the still open
    /// transaction to the caller.
    pub async fn finalize_withdraw(
        &self,
        attempt: WithdrawalAttempt,
        payload: &MethodPayload,
    ) -> ServiceResult<Withdrawal> {
        let overdrawn = attempt.is_overdrawn();
        let WithdrawalAttempt {
            mut tx,
            update,
            client,
            amount,
        } = attempt;

        if overdrawn {
            tx.rollback().await?;
            let trans = self.record_declined(&update.account, payload, amount).await?;
            ledger::log_committed(&trans, client, payload);
            return Ok(Withdrawal::Declined(trans));
        }

        let trans = Self::record_success(&mut tx, &update.account, payload, -amount.value()).await?;
        Ok(Withdrawal::Applied {
            tx,
            trans,
            sender: update,
        })
    }

    /// `attempt_withdraw` followed by `finalize_withdraw`, with the method
    /// derived from the debited account
    pub async fn withdraw<F>(
        &self,
        tx: StoreTx,
        account: AccountId,
        client: ClientId,
        amount: Amount,
        method: F,
    ) -> ServiceResult<Withdrawal>
    where
        F: FnOnce(&Account) -> MethodPayload,
    {
        let attempt = Self::attempt_withdraw(tx, account, client, amount).await?;
        let payload = method(attempt.account());
        self.finalize_withdraw(attempt, &payload).await
    }

    /// Move `amount` from `from` (owned by `client`) to `to`.
    ///
    /// The receiver is credited before the sender is debited. Both legs share
    /// one transaction and a declined debit rolls the credit back with it;
    /// this ordering is only safe on a store with full transactional rollback.
    ///
    /// Currencies are compared on the tentative debit, before it is judged: a
    /// mismatch rolls everything back and records nothing, even when the
    /// sender could not have paid.
    pub async fn transfer(
        &self,
        from: AccountId,
        client: ClientId,
        to: AccountId,
        amount: Amount,
    ) -> ServiceResult<PaymentOutcome> {
        if from == to {
            return Err(ServiceError::SameAccount);
        }

        let mut tx = self.db.begin().await?;
        let receiver = AccountStore::credit(tx.conn(), to, amount.value())
            .await?
            .ok_or(ServiceError::AccountNotFound(to))?;

        let attempt = Self::attempt_withdraw(tx, from, client, amount).await?;
        if attempt.account().currency != receiver.account.currency {
            let from_currency = attempt.account().currency.clone();
            attempt.abandon().await?;
            return Err(ServiceError::CurrencyMismatch {
                from: from_currency,
                to: receiver.account.currency,
            });
        }

        let sender_method = MethodPayload::AccountTransfer(LinkedAccount {
            account: to,
            email: receiver.owner_email.clone(),
        });
        let (mut tx, sender_trans, sender) =
            match self.finalize_withdraw(attempt, &sender_method).await? {
                Withdrawal::Declined(trans) => return Ok(PaymentOutcome::Declined(trans)),
                Withdrawal::Applied { tx, trans, sender } => (tx, trans, sender),
            };

        let receiver_method = MethodPayload::AccountTransfer(LinkedAccount {
            account: from,
            email: sender.owner_email.clone(),
        });
        let receiver_trans =
            Self::record_success(&mut tx, &receiver.account, &receiver_method, amount.value())
                .await?;
        tx.commit().await?;

        ledger::log_committed(&sender_trans, client, &sender_method);
        ledger::log_committed(&receiver_trans, receiver.account.client, &receiver_method);
        Ok(PaymentOutcome::Completed(vec![sender_trans, receiver_trans]))
    }

    /// Pay a tax bill from `account`
    pub async fn pay_tax(
        &self,
        account: AccountId,
        client: ClientId,
        bill: String,
        amount: Amount,
    ) -> ServiceResult<PaymentOutcome> {
        let tx = self.db.begin().await?;
        let payload = MethodPayload::Tax(TaxBill { bill });
        let withdrawal = self
            .withdraw(tx, account, client, amount, |_| payload.clone())
            .await?;

        match withdrawal {
            Withdrawal::Declined(trans) => Ok(PaymentOutcome::Declined(trans)),
            Withdrawal::Applied { tx, trans, .. } => {
                tx.commit().await?;
                ledger::log_committed(&trans, client, &payload);
                Ok(PaymentOutcome::Completed(vec![trans]))
            }
        }
    }

    async fn record_success(
        tx: &mut StoreTx,
        account: &Account,
        payload: &MethodPayload,
        value: Decimal,
    ) -> ServiceResult<Trans> {
        let method = MethodRegistry::resolve(tx.conn(), account, payload).await?;
        TransactionLedger::append(tx.conn(), TransStatus::Success, account.id, method, value, None)
            .await
    }

    /// Failed transaction in its own transaction, no balance change
    async fn record_declined(
        &self,
        account: &Account,
        payload: &MethodPayload,
        amount: Amount,
    ) -> ServiceResult<Trans> {
        let mut tx = self.db.begin().await?;
        let method = MethodRegistry::resolve(tx.conn(), account, payload).await?;
        let trans = TransactionLedger::append(
            tx.conn(),
            TransStatus::Failed,
            account.id,
            method,
            -amount.value(),
            Some(INSUFFICIENT_FUNDS),
        )
        .await?;
        tx.commit().await?;
        Ok(trans)
    }
}
