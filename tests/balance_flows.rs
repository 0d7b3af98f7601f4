//! Deposit, withdrawal, transfer and tax payment against PostgreSQL
//!
//! Run with `DATABASE_URL=... cargo test -- --ignored`.

mod common;

use rust_decimal::Decimal;

use common::{create_account, create_client, create_test_db, load_account, success_sum, trans_count};
use elefantpay::balance::{BalanceMutator, INSUFFICIENT_FUNDS, PaymentOutcome};
use elefantpay::core_types::AccountId;
use elefantpay::ledger::TransStatus;
use elefantpay::method::{BankCard, MethodRegistry, MethodType};
use elefantpay::validation::Amount;
use elefantpay::{ErrorKind, ServiceError};

fn card() -> BankCard {
    BankCard {
        number: 4111111111111111,
        valid_thru_month: 12,
        valid_thru_year: 2030,
        cvc: "123".to_string(),
    }
}

fn amount(value: i64) -> Amount {
    Amount::new(Decimal::from(value)).unwrap()
}

// ============================================================================
// Deposit
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_deposit_credits_account() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "deposit", "x").await;
    let account = create_account(&db, &client, "EUR").await;

    let trans = balance
        .deposit(account.id, client.id, card(), amount(100))
        .await
        .unwrap();
    assert_eq!(trans.status, TransStatus::Success);
    assert_eq!(trans.value, Decimal::from(100));
    assert_eq!(trans.account, account.id);

    let after = load_account(&db, &account).await;
    assert_eq!(after.balance, Decimal::from(100));
    assert_eq!(after.revision, account.revision + 1);

    let mut conn = db.pool().acquire().await.unwrap();
    let method = MethodRegistry::get(&mut conn, trans.method).await.unwrap();
    assert_eq!(method.method_type(), MethodType::BankCard);
    assert_eq!(method.client, Some(client.id));
    assert_eq!(method.display_name(), "bank card 4111 ... 1111");
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_deposit_to_foreign_account_is_not_found() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let owner = create_client(&db, "owner", "x").await;
    let stranger = create_client(&db, "stranger", "x").await;
    let account = create_account(&db, &owner, "EUR").await;

    let err = balance
        .deposit(account.id, stranger.id, card(), amount(10))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccountNotFound(id) if id == account.id));
    assert_eq!(trans_count(&db, account.id).await, 0);
    assert_eq!(load_account(&db, &account).await.revision, account.revision);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_same_card_reuses_method() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "dedup", "x").await;
    let other = create_client(&db, "dedup-other", "x").await;
    let account = create_account(&db, &client, "EUR").await;
    let other_account = create_account(&db, &other, "EUR").await;

    let first = balance
        .deposit(account.id, client.id, card(), amount(5))
        .await
        .unwrap();
    let second = balance
        .deposit(account.id, client.id, card(), amount(7))
        .await
        .unwrap();
    assert_eq!(first.method, second.method);

    let mut other_card = card();
    other_card.cvc = "999".to_string();
    let third = balance
        .deposit(account.id, client.id, other_card, amount(1))
        .await
        .unwrap();
    assert_ne!(first.method, third.method);

    // Same card, different client: separate method row
    let foreign = balance
        .deposit(other_account.id, other.id, card(), amount(1))
        .await
        .unwrap();
    assert_ne!(first.method, foreign.method);
}

// ============================================================================
// Declined withdrawal
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_tax_payment_without_funds_is_declined() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "tax-poor", "x").await;
    let account = create_account(&db, &client, "EUR").await;

    let outcome = balance
        .pay_tax(account.id, client.id, "B-17".to_string(), amount(50))
        .await
        .unwrap();
    let PaymentOutcome::Declined(trans) = outcome else {
        panic!("expected declined payment");
    };
    assert_eq!(trans.status, TransStatus::Failed);
    assert_eq!(trans.value, Decimal::from(-50));
    assert_eq!(trans.status_reason.as_deref(), Some(INSUFFICIENT_FUNDS));

    // Balance and revision untouched, the Failed row is committed
    let after = load_account(&db, &account).await;
    assert_eq!(after.balance, Decimal::ZERO);
    assert_eq!(after.revision, account.revision);
    assert_eq!(trans_count(&db, account.id).await, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_tax_payment_and_shared_method() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let first = create_client(&db, "tax-a", "x").await;
    let second = create_client(&db, "tax-b", "x").await;
    let first_account = create_account(&db, &first, "EUR").await;
    let second_account = create_account(&db, &second, "EUR").await;
    for (account, client) in [(&first_account, &first), (&second_account, &second)] {
        balance
            .deposit(account.id, client.id, card(), amount(100))
            .await
            .unwrap();
    }

    let bill = format!("BILL-{}", uuid::Uuid::new_v4().simple());
    let outcome = balance
        .pay_tax(first_account.id, first.id, bill.clone(), amount(30))
        .await
        .unwrap();
    let PaymentOutcome::Completed(first_legs) = outcome else {
        panic!("expected completed payment");
    };
    let outcome = balance
        .pay_tax(second_account.id, second.id, bill.clone(), amount(20))
        .await
        .unwrap();
    let PaymentOutcome::Completed(second_legs) = outcome else {
        panic!("expected completed payment");
    };

    // A bill is one method for every payer
    assert_eq!(first_legs[0].method, second_legs[0].method);
    let mut conn = db.pool().acquire().await.unwrap();
    let method = MethodRegistry::get(&mut conn, first_legs[0].method).await.unwrap();
    assert_eq!(method.client, None);
    assert_eq!(method.method_type(), MethodType::Tax);

    assert_eq!(load_account(&db, &first_account).await.balance, Decimal::from(70));
    assert_eq!(load_account(&db, &second_account).await.balance, Decimal::from(80));
}

// ============================================================================
// Transfer
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_transfer_moves_money() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let sender = create_client(&db, "sender", "x").await;
    let receiver = create_client(&db, "receiver", "x").await;
    let from = create_account(&db, &sender, "EUR").await;
    let to = create_account(&db, &receiver, "EUR").await;
    balance
        .deposit(from.id, sender.id, card(), amount(100))
        .await
        .unwrap();

    let outcome = balance
        .transfer(from.id, sender.id, to.id, amount(40))
        .await
        .unwrap();
    let PaymentOutcome::Completed(legs) = outcome else {
        panic!("expected completed transfer");
    };
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].account, from.id);
    assert_eq!(legs[0].value, Decimal::from(-40));
    assert_eq!(legs[1].account, to.id);
    assert_eq!(legs[1].value, Decimal::from(40));

    assert_eq!(load_account(&db, &from).await.balance, Decimal::from(60));
    let to_after = load_account(&db, &to).await;
    assert_eq!(to_after.balance, Decimal::from(40));
    assert_eq!(to_after.revision, to.revision + 1);

    // Each leg names the counterparty
    let mut conn = db.pool().acquire().await.unwrap();
    let sender_method = MethodRegistry::get(&mut conn, legs[0].method).await.unwrap();
    assert_eq!(sender_method.display_name(), receiver.email);
    let receiver_method = MethodRegistry::get(&mut conn, legs[1].method).await.unwrap();
    assert_eq!(receiver_method.display_name(), sender.email);
    assert_eq!(receiver_method.client, Some(receiver.id));
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_declined_transfer_leaves_receiver_untouched() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let sender = create_client(&db, "sender-poor", "x").await;
    let receiver = create_client(&db, "receiver-poor", "x").await;
    let from = create_account(&db, &sender, "EUR").await;
    let to = create_account(&db, &receiver, "EUR").await;
    balance
        .deposit(from.id, sender.id, card(), amount(10))
        .await
        .unwrap();

    let outcome = balance
        .transfer(from.id, sender.id, to.id, amount(40))
        .await
        .unwrap();
    assert!(outcome.is_declined());

    assert_eq!(load_account(&db, &from).await.balance, Decimal::from(10));
    let to_after = load_account(&db, &to).await;
    assert_eq!(to_after.balance, Decimal::ZERO);
    assert_eq!(to_after.revision, to.revision);
    assert_eq!(trans_count(&db, to.id).await, 0);
    // Deposit plus the Failed attempt
    assert_eq!(trans_count(&db, from.id).await, 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_transfer_rejections() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "multi", "x").await;
    let eur = create_account(&db, &client, "EUR").await;
    let usd = create_account(&db, &client, "USD").await;
    balance
        .deposit(eur.id, client.id, card(), amount(100))
        .await
        .unwrap();

    let err = balance
        .transfer(eur.id, client.id, eur.id, amount(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SameAccount));

    let err = balance
        .transfer(eur.id, client.id, usd.id, amount(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CurrencyMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = balance
        .transfer(eur.id, client.id, AccountId::new(), amount(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccountNotFound(_)));

    // Nothing moved on any rejection
    assert_eq!(load_account(&db, &eur).await.balance, Decimal::from(100));
    let usd_after = load_account(&db, &usd).await;
    assert_eq!(usd_after.balance, Decimal::ZERO);
    assert_eq!(usd_after.revision, usd.revision);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_currency_mismatch_wins_over_missing_funds() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "mismatch-poor", "x").await;
    let eur = create_account(&db, &client, "EUR").await;
    let usd = create_account(&db, &client, "USD").await;
    balance
        .deposit(eur.id, client.id, card(), amount(10))
        .await
        .unwrap();
    let eur_before = load_account(&db, &eur).await;

    let err = balance
        .transfer(eur.id, client.id, usd.id, amount(50))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CurrencyMismatch { .. }));

    // No Failed row, no balance or revision change on either side
    assert_eq!(trans_count(&db, eur.id).await, 1);
    assert_eq!(trans_count(&db, usd.id).await, 0);
    assert_eq!(load_account(&db, &eur).await, eur_before);
    assert_eq!(load_account(&db, &usd).await, usd);
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_card_method_keeps_first_currency() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "two-currencies", "x").await;
    let eur = create_account(&db, &client, "EUR").await;
    let usd = create_account(&db, &client, "USD").await;

    let first = balance
        .deposit(eur.id, client.id, card(), amount(5))
        .await
        .unwrap();
    let second = balance
        .deposit(usd.id, client.id, card(), amount(5))
        .await
        .unwrap();

    // One method per (client, type, key); its currency is where it was first used
    assert_eq!(first.method, second.method);
    let mut conn = db.pool().acquire().await.unwrap();
    let method = MethodRegistry::get(&mut conn, second.method).await.unwrap();
    assert_eq!(method.currency.as_str(), "EUR");
}

// ============================================================================
// Ledger consistency
// ============================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_balance_equals_success_sum() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let a = create_client(&db, "sum-a", "x").await;
    let b = create_client(&db, "sum-b", "x").await;
    let a_account = create_account(&db, &a, "EUR").await;
    let b_account = create_account(&db, &b, "EUR").await;

    balance
        .deposit(a_account.id, a.id, card(), amount(100))
        .await
        .unwrap();
    balance
        .transfer(a_account.id, a.id, b_account.id, amount(30))
        .await
        .unwrap();
    balance
        .transfer(b_account.id, b.id, a_account.id, amount(50))
        .await
        .unwrap();
    balance
        .pay_tax(a_account.id, a.id, "B-1".to_string(), amount(60))
        .await
        .unwrap();
    balance
        .pay_tax(a_account.id, a.id, "B-2".to_string(), amount(1000))
        .await
        .unwrap();

    for account in [&a_account, &b_account] {
        let after = load_account(&db, account).await;
        assert!(after.balance >= Decimal::ZERO);
        assert_eq!(after.balance, success_sum(&db, account.id).await);
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL database"]
async fn test_concurrent_withdrawals_never_overdraw() {
    let db = create_test_db().await;
    let balance = BalanceMutator::new(db.clone());
    let client = create_client(&db, "race", "x").await;
    let account = create_account(&db, &client, "EUR").await;
    balance
        .deposit(account.id, client.id, card(), amount(100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let balance = balance.clone();
        let (account, client) = (account.id, client.id);
        handles.push(tokio::spawn(async move {
            balance
                .pay_tax(account, client, format!("R-{}", i), amount(30))
                .await
                .unwrap()
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if !handle.await.unwrap().is_declined() {
            completed += 1;
        }
    }
    assert_eq!(completed, 3);

    let after = load_account(&db, &account).await;
    assert_eq!(after.balance, Decimal::from(10));
    assert_eq!(after.balance, success_sum(&db, account.id).await);
}
