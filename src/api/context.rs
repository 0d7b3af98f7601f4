use std::sync::Arc;

use crate::balance::BalanceMutator;
use crate::config::AppConfig;
use crate::confirmation::ClientConfirmationFlow;
use crate::credentials::{Argon2Hasher, CredentialHasher};
use crate::db::Database;
use crate::email::{self, EmailError, EmailSender};

/// Services shared by all operations, built once at startup
pub struct AppContext {
    pub config: AppConfig,
    pub db: Database,
    pub balance: BalanceMutator,
    pub confirmation: ClientConfirmationFlow,
    pub hasher: Arc<dyn CredentialHasher>,
}

impl AppContext {
    pub fn new(config: AppConfig, db: Database) -> Result<Self, EmailError> {
        let sender = email::from_config(&config.email)?;
        Ok(Self::with_collaborators(
            config,
            db,
            Arc::new(Argon2Hasher),
            sender,
        ))
    }

    pub fn with_collaborators(
        config: AppConfig,
        db: Database,
        hasher: Arc<dyn CredentialHasher>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let confirmation = ClientConfirmationFlow::new(
            db.clone(),
            hasher.clone(),
            sender,
            config.auth.clone(),
            config.email.confirmation_template.clone(),
        );
        Self {
            balance: BalanceMutator::new(db.clone()),
            confirmation,
            hasher,
            db,
            config,
        }
    }
}
