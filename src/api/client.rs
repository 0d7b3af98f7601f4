//! Client operations: registration, 2FA login, logout

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::context::AppContext;
use super::types::{Request, Response};
use super::Operation;
use crate::account::AccountStore;
use crate::client::ClientRepository;
use crate::confirmation::ConfirmationCode;
use crate::core_types::{ClientId, ConfirmationId};
use crate::credentials::hash_blocking;
use crate::error::{ServiceError, ServiceResult};
use crate::session::{AUTH_TOKEN_HEADER, SessionMeta, SessionTokenAuthority};
use crate::validation::{ClientName, Currency, Email, Password, parse_id};

#[derive(Debug, Deserialize)]
struct ClientRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

// ============================================================================
// ClientCreate
// ============================================================================

/// Register a client together with an account in the default currency
pub struct ClientCreate;

#[async_trait]
impl Operation for ClientCreate {
    fn requires_auth(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let body: ClientRequest = request.parse_body()?;
        let email = Email::new(&body.email)?;
        let password = Password::new(&body.password, ctx.config.auth.min_password_len)?;
        let name = ClientName::new(body.name.as_deref().unwrap_or(email.as_str()))?;
        let currency = Currency::new(&ctx.config.accounts.default_currency)?;

        let password_hash =
            hash_blocking(ctx.hasher.clone(), password.expose().to_string()).await?;

        let mut tx = ctx.db.begin().await?;
        let client = ClientRepository::create(tx.conn(), &email, &name, &password_hash).await?;
        let account = AccountStore::create(tx.conn(), client.id, &currency).await?;
        tx.commit().await?;

        tracing::info!(client = %client.id, account = %account.id, "Created new client");
        Ok(Response::empty(201))
    }
}

// ============================================================================
// ClientLogin
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginStarted {
    confirmation: ConfirmationId,
}

/// Check credentials and mail a 2FA code
pub struct ClientLogin;

#[async_trait]
impl Operation for ClientLogin {
    fn requires_auth(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let body: ClientRequest = request.parse_body()?;
        let confirmation = ctx.confirmation.start(&body.email, &body.password).await?;
        Response::data(202, LoginStarted { confirmation })
    }
}

// ============================================================================
// ClientConfirm
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    confirmation: String,
    code: String,
}

#[derive(Debug, Serialize)]
struct Confirmed {
    client: ClientId,
}

/// Trade a 2FA code for a session token
pub struct ClientConfirm;

#[async_trait]
impl Operation for ClientConfirm {
    fn requires_auth(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let body: ConfirmRequest = request.parse_body()?;
        let id: ConfirmationId = parse_id("confirmation", &body.confirmation)?;
        let code: ConfirmationCode = body.code.parse()?;
        let meta = SessionMeta {
            user_agent: request.header("User-Agent").map(str::to_string),
            source_ip: request
                .header("X-Forwarded-For")
                .and_then(|v| v.split(',').next())
                .map(|ip| ip.trim().to_string()),
        };

        let (token, client) = ctx.confirmation.finish(id, code, &meta).await?;
        Ok(Response::data(201, Confirmed { client })?.with_header(AUTH_TOKEN_HEADER, token.to_string()))
    }
}

// ============================================================================
// ClientLogout / ClientLogoutAll
// ============================================================================

/// End the caller's session chain
pub struct ClientLogout;

#[async_trait]
impl Operation for ClientLogout {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;
        let token = request.token.ok_or(ServiceError::SessionNotFound)?;

        let mut tx = ctx.db.begin().await?;
        let revoked = SessionTokenAuthority::revoke_client_auth(tx.conn(), token, client).await?;
        tx.commit().await?;

        if !revoked {
            return Err(ServiceError::SessionNotFound);
        }
        tracing::info!(client = %client, "Session closed");
        Ok(Response::empty(204).closing_session())
    }
}

#[derive(Debug, Serialize)]
struct LogoutAll {
    revoked: u64,
}

/// End every session chain of the caller
pub struct ClientLogoutAll;

#[async_trait]
impl Operation for ClientLogoutAll {
    async fn run(&self, ctx: &AppContext, request: &Request) -> ServiceResult<Response> {
        let client = request.client_id()?;

        let mut tx = ctx.db.begin().await?;
        let revoked = SessionTokenAuthority::revoke_all_client_auth(tx.conn(), client).await?;
        tx.commit().await?;

        tracing::info!(client = %client, revoked, "All sessions closed");
        Ok(Response::data(200, LogoutAll { revoked })?.closing_session())
    }
}
