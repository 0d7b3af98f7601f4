use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Application configuration, loaded once at startup and passed down to the
/// services that need it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// "dev" dumps requests and responses to the log
    #[serde(default = "default_stage")]
    pub stage: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

fn default_stage() -> String {
    "dev".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

/// Session and 2FA policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// Confirmation codes older than this are rejected and purged
    pub confirmation_live_minutes: i64,
    /// No new confirmation is issued for a client inside this window
    pub confirmation_cooldown_secs: i64,
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            confirmation_live_minutes: 60,
            confirmation_cooldown_secs: 60,
            min_password_len: 8,
        }
    }
}

impl AuthConfig {
    pub fn confirmation_live_time(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.confirmation_live_minutes)
    }

    pub fn confirmation_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.confirmation_cooldown_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountsConfig {
    /// Currency of the account opened together with a new client
    pub default_currency: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            default_currency: "EUR".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    /// Write the message to the log instead of sending it
    #[default]
    Log,
    Sendgrid,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EmailConfig {
    #[serde(default)]
    pub provider: EmailProvider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub from_address: String,
    /// Template rendering the 2FA code
    #[serde(default)]
    pub confirmation_template: String,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&config_path, &content)
    }

    pub fn from_yaml(path: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn is_dev(&self) -> bool {
        self.stage == "dev"
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database.acquire_timeout_secs)
    }
}
