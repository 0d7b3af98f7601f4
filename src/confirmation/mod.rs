//! Two-factor login confirmation
//!
//! Login is two calls: `start` checks the password and mails a short code,
//! `finish` trades `(id, code)` for a session token. Codes live for a
//! configured window; every acceptance attempt also sweeps expired codes.

mod code;
mod store;

pub use code::{ConfirmationCode, ConfirmationGenerator, RandomConfirmationGenerator};
pub use store::{
    ConfirmationSink, ISSUE_ATTEMPTS, accept_confirmation, find_last_confirmation,
    issue_confirmation,
};

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::ClientRepository;
use crate::config::AuthConfig;
use crate::core_types::{ClientId, ConfirmationId, SessionToken};
use crate::credentials::{CredentialHasher, verify_blocking};
use crate::db::Database;
use crate::email::EmailSender;
use crate::error::{ServiceError, ServiceResult};
use crate::session::{SessionMeta, SessionTokenAuthority};

pub struct ClientConfirmationFlow {
    db: Database,
    hasher: Arc<dyn CredentialHasher>,
    email: Arc<dyn EmailSender>,
    generator: Arc<dyn ConfirmationGenerator>,
    auth: AuthConfig,
    template_id: String,
}

impl ClientConfirmationFlow {
    pub fn new(
        db: Database,
        hasher: Arc<dyn CredentialHasher>,
        email: Arc<dyn EmailSender>,
        auth: AuthConfig,
        template_id: String,
    ) -> Self {
        Self {
            db,
            hasher,
            email,
            generator: Arc::new(RandomConfirmationGenerator),
            auth,
            template_id,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ConfirmationGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Verify credentials, issue a confirmation and mail its code.
    ///
    /// The confirmation is committed before the mail goes out; a delivery
    /// failure is logged and the client can ask again after the cool-down.
    pub async fn start(&self, email: &str, password: &str) -> ServiceResult<ConfirmationId> {
        let mut tx = self.db.begin().await?;

        let client = ClientRepository::find_by_email(tx.conn(), email).await?;
        let stored = client.as_ref().map(|c| c.password_hash.clone());
        let verified = verify_blocking(self.hasher.clone(), password.to_string(), stored).await?;
        let client = match client {
            Some(client) if verified => client,
            _ => return Err(ServiceError::InvalidCredentials),
        };

        if find_last_confirmation(tx.conn(), client.id, self.auth.confirmation_cooldown())
            .await?
            .is_some()
        {
            tracing::info!(client = %client.id, "Confirmation requested inside cool-down");
            return Err(ServiceError::ConfirmationCooldown);
        }

        let (id, code) = issue_confirmation(tx.conn(), client.id, self.generator.as_ref()).await?;
        tx.commit().await?;
        tracing::info!(client = %client.id, confirmation_id = %id, "Confirmation issued");

        let mut data = HashMap::new();
        data.insert("code".to_string(), code.to_string());
        data.insert("name".to_string(), client.name.clone());
        if let Err(e) = self.email.send(&self.template_id, &client.email, &data).await {
            tracing::error!(
                client = %client.id,
                confirmation_id = %id,
                error = %e,
                "Failed to send confirmation email"
            );
        }

        Ok(id)
    }

    /// Accept a code: mark the client confirmed and open a session chain.
    ///
    /// A rejected code still commits the expiry sweep.
    pub async fn finish(
        &self,
        id: ConfirmationId,
        code: ConfirmationCode,
        meta: &SessionMeta,
    ) -> ServiceResult<(SessionToken, ClientId)> {
        let mut tx = self.db.begin().await?;

        let accepted =
            accept_confirmation(tx.conn(), id, code, self.auth.confirmation_live_time()).await?;
        let Some(client) = accepted else {
            tx.commit().await?;
            tracing::debug!(confirmation_id = %id, "Confirmation rejected");
            return Err(ServiceError::ConfirmationNotFound);
        };

        ClientRepository::mark_confirmed(tx.conn(), client).await?;
        let token = SessionTokenAuthority::create_auth(tx.conn(), client, meta).await?;
        tx.commit().await?;

        tracing::info!(client = %client, confirmation_id = %id, "Client confirmed, session created");
        Ok((token, client))
    }
}
