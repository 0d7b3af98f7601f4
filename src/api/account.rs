//! Account operations: open, list, watch, and move money

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::context::AppContext;
use super::types::{Request, Response};
use super::Operation;
use crate::account::{Account, AccountStore};
use crate::balance::PaymentOutcome;
use crate::core_types::{AccountId, MethodId, Revision, TransId};
use crate::error::ServiceResult;
use crate::ledger::{HistoryEntry, TransStatus};
use crate::method::BankCard;
use crate::validation::{Amount, Currency, ValidationError, parse_id};

/// Success status of every accepted payment
const ACCEPTED: u16 = 202;
/// A payment declined for lack of funds
const PAYMENT_REQUIRED: u16 = 402;

// ============================================================================
// AccountCreate / AccountList
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateAccountRequest {
    currency: String,
}

/// Open another account for the caller
pub struct AccountCreate;

#[async_trait]
impl Operation for AccountCreate {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let body: CreateAccountRequest = request.parse_body()?;
        let currency = Currency::new(&body.currency)?;

        let mut tx = ctx.db.begin().await?;
        let account = AccountStore::create(tx.conn(), client, &currency).await?;
        tx.commit().await?;

        tracing::info!(client = %client, account = %account.id, currency = %currency, "Account created");
        Response::data(201, account)
    }
}

/// All accounts of the caller
pub struct AccountList;

#[async_trait]
impl Operation for AccountList {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let mut conn = ctx.db.pool().acquire().await?;
        let accounts = AccountStore::list(&mut conn, client).await?;
        Response::data(200, accounts)
    }
}

// ============================================================================
// AccountInfo
// ============================================================================

#[derive(Debug, Serialize)]
struct MethodView {
    id: MethodId,
    #[serde(rename = "type")]
    method_type: &'static str,
    name: String,
}

#[derive(Debug, Serialize)]
struct TransView {
    id: TransId,
    value: Decimal,
    time: DateTime<Utc>,
    status: TransStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    method: MethodView,
}

impl From<HistoryEntry> for TransView {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            id: entry.trans.id,
            value: entry.trans.value,
            time: entry.trans.time,
            status: entry.trans.status,
            reason: entry.trans.status_reason,
            method: MethodView {
                id: entry.method.id,
                method_type: entry.method.method_type().name(),
                name: entry.method.display_name(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct AccountInfoView {
    #[serde(flatten)]
    account: Account,
    history: Vec<TransView>,
}

/// Account state and history if it changed after the `from` revision
pub struct AccountInfo;

#[async_trait]
impl Operation for AccountInfo {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let account: AccountId = request.path_id("account")?;
        let from: Revision = request.query_i64("from", 0)?;

        let mut conn = ctx.db.pool().acquire().await?;
        match AccountStore::find_update(&mut conn, account, client, from).await? {
            None => Ok(Response::empty(204)),
            Some(update) => Response::data(
                200,
                AccountInfoView {
                    account: update.account,
                    history: update.history.into_iter().map(TransView::from).collect(),
                },
            ),
        }
    }
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardSource {
    number: u64,
    valid_thru_month: u8,
    valid_thru_year: u16,
    cvc: String,
}

#[derive(Debug, Deserialize)]
struct DepositRequest {
    value: Decimal,
    source: CardSource,
}

/// Top up an account from a card
pub struct AccountDeposit;

#[async_trait]
impl Operation for AccountDeposit {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let account: AccountId = request.path_id("account")?;
        let body: DepositRequest = request.parse_body()?;
        let amount = Amount::new(body.value)?;
        let card = BankCard {
            number: body.source.number,
            valid_thru_month: body.source.valid_thru_month,
            valid_thru_year: body.source.valid_thru_year,
            cvc: body.source.cvc,
        };

        let trans = ctx.balance.deposit(account, client, card, amount).await?;
        Response::data(ACCEPTED, vec![trans])
    }
}

#[derive(Debug, Deserialize)]
struct PaymentToAccountRequest {
    value: Decimal,
    account: String,
}

/// Pay from one of the caller's accounts to any account in the same currency
pub struct AccountPaymentToAccount;

#[async_trait]
impl Operation for AccountPaymentToAccount {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let from: AccountId = request.path_id("account")?;
        let body: PaymentToAccountRequest = request.parse_body()?;
        let amount = Amount::new(body.value)?;
        let to: AccountId = parse_id("receiver account", &body.account)?;

        let outcome = ctx.balance.transfer(from, client, to, amount).await?;
        payment_response(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct PaymentTaxRequest {
    value: Decimal,
    bill: String,
}

/// Pay a tax bill
pub struct AccountPaymentTax;

#[async_trait]
impl Operation for AccountPaymentTax {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let account: AccountId = request.path_id("account")?;
        let body: PaymentTaxRequest = request.parse_body()?;
        let amount = Amount::new(body.value)?;
        let bill = body.bill.trim();
        if bill.is_empty() {
            return Err(ValidationError::MissingArgument("bill").into());
        }

        let outcome = ctx
            .balance
            .pay_tax(account, client, bill.to_string(), amount)
            .await?;
        payment_response(outcome)
    }
}

fn payment_response(outcome: PaymentOutcome) -> ServiceResult<Response> {
    match outcome {
        PaymentOutcome::Completed(trans) => Response::data(ACCEPTED, trans),
        PaymentOutcome::Declined(trans) => {
            let reason = trans.status_reason.clone().unwrap_or_default();
            Response::with_envelope(PAYMENT_REQUIRED, "PAYMENT_DECLINED", reason, Some(trans))
        }
    }
}
