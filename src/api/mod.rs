//! Operations surface
//!
//! Each operation is a named handler over a transport-neutral [`Request`].
//! [`dispatch`] authenticates the caller by rotating its bearer token, runs
//! the handler and maps errors to responses. Only a fatal error escapes.

mod account;
mod client;
mod context;
pub mod registry;
mod types;

pub use account::{
    AccountCreate, AccountDeposit, AccountInfo, AccountList, AccountPaymentTax,
    AccountPaymentToAccount,
};
pub use client::{ClientConfirm, ClientCreate, ClientLogin, ClientLogout, ClientLogoutAll};
pub use context::AppContext;
pub use types::{Envelope, Request, Response};

use async_trait::async_trait;

use crate::core_types::{ClientId, SessionToken};
use crate::error::{ErrorKind, ServiceError, ServiceResult};
use crate::session::{AUTH_TOKEN_HEADER, SessionTokenAuthority, parse_bearer};

#[async_trait]
pub trait Operation: Send + Sync {
    /// Operations run for an anonymous caller return `false`
    fn requires_auth(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response>;
}

/// Run `operation` for `request`.
///
/// Authenticated operations first rotate the presented token in a transaction
/// of their own; the new token is returned in the `Auth-Token` header whether
/// the operation itself succeeds or not.
pub async fn dispatch(
    ctx: &AppContext,
    operation: &dyn Operation,
    mut request: Request,
) -> ServiceResult<Response> {
    if ctx.config.is_dev() {
        tracing::debug!(request = ?request, "Request");
    }

    let mut rotated = None;
    if operation.requires_auth() {
        match authorize(ctx, &request).await {
            Ok((old, new, client)) => {
                request.token = Some(old);
                request.client = Some(client);
                rotated = Some(new);
            }
            Err(e) => return respond(ctx, e),
        }
    }

    let mut response = match operation.run(ctx, &request).await {
        Ok(response) => response,
        Err(e) => respond(ctx, e)?,
    };

    if let Some(token) = rotated
        && !response.session_closed
    {
        response
            .headers
            .entry(AUTH_TOKEN_HEADER.to_string())
            .or_insert_with(|| token.to_string());
    }

    if ctx.config.is_dev() {
        tracing::debug!(response = ?response, "Response");
    }
    Ok(response)
}

async fn authorize(
    ctx: &AppContext,
    request: &Request,
) -> ServiceResult<(SessionToken, SessionToken, ClientId)> {
    let header = request
        .header("Authorization")
        .ok_or(ServiceError::SessionNotFound)?;
    let token = parse_bearer(header).map_err(|_| ServiceError::SessionNotFound)?;

    let mut tx = ctx.db.begin().await?;
    let Some((new, client)) = SessionTokenAuthority::recreate_auth(tx.conn(), token).await? else {
        tracing::debug!(token = %token, "Unknown token");
        return Err(ServiceError::SessionNotFound);
    };
    tx.commit().await?;

    tracing::debug!(client = %client, "Auth-token recreated");
    Ok((token, new, client))
}

/// Error to response; fatal errors are passed up
fn respond(ctx: &AppContext, e: ServiceError) -> ServiceResult<Response> {
    match e.kind() {
        ErrorKind::Fatal => {
            tracing::error!(error = %e, "Fatal error, transaction state unknown");
            Err(e)
        }
        ErrorKind::Internal | ErrorKind::Transient => {
            tracing::error!(error = %e, code = e.code(), "Request failed");
            Ok(Response::error(&e))
        }
        _ => {
            if ctx.config.is_dev() {
                tracing::info!(error = %e, code = e.code(), "Request rejected");
            }
            Ok(Response::error(&e))
        }
    }
}
