//! Outbound email delivery
//!
//! Only the 2FA flow sends mail. Delivery runs after the confirmation row is
//! committed, so a send failure is logged and never undoes it.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{EmailConfig, EmailProvider};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Email sender is not configured: {0}")]
    NotConfigured(&'static str),
}

/// Template-based email dispatch
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(
        &self,
        template_id: &str,
        recipient: &str,
        template_data: &HashMap<String, String>,
    ) -> Result<(), EmailError>;
}

/// Build the sender selected in config
pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, EmailError> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogEmailSender)),
        EmailProvider::Sendgrid => Ok(Arc::new(SendGridSender::new(config)?)),
    }
}

// ============================================================================
// SendGrid
// ============================================================================

#[derive(Serialize)]
struct MailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<MailAddress<'a>>,
    dynamic_template_data: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: MailAddress<'a>,
    personalizations: Vec<Personalization<'a>>,
    template_id: &'a str,
}

/// SendGrid v3 dynamic-template sender
pub struct SendGridSender {
    client: reqwest::Client,
    api_key: String,
    from_name: String,
    from_address: String,
}

impl SendGridSender {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        if config.api_key.is_empty() {
            return Err(EmailError::NotConfigured("api_key"));
        }
        if config.from_address.is_empty() {
            return Err(EmailError::NotConfigured("from_address"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            from_name: config.from_name.clone(),
            from_address: config.from_address.clone(),
        })
    }

    fn request<'a>(
        &'a self,
        template_id: &'a str,
        recipient: &'a str,
        template_data: &'a HashMap<String, String>,
    ) -> SendRequest<'a> {
        SendRequest {
            from: MailAddress {
                email: &self.from_address,
                name: Some(self.from_name.as_str()).filter(|name| !name.is_empty()),
            },
            personalizations: vec![Personalization {
                to: vec![MailAddress {
                    email: recipient,
                    name: None,
                }],
                dynamic_template_data: template_data,
            }],
            template_id,
        }
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(
        &self,
        template_id: &str,
        recipient: &str,
        template_data: &HashMap<String, String>,
    ) -> Result<(), EmailError> {
        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request(template_id, recipient, template_data))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(recipient, template_id, "Email accepted by SendGrid");
        Ok(())
    }
}

// ============================================================================
// Log-only
// ============================================================================

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(
        &self,
        template_id: &str,
        recipient: &str,
        template_data: &HashMap<String, String>,
    ) -> Result<(), EmailError> {
        tracing::info!(recipient, template_id, data = ?template_data, "Email (not sent)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sendgrid_config() -> EmailConfig {
        EmailConfig {
            provider: EmailProvider::Sendgrid,
            api_key: "SG.test".to_string(),
            from_name: "Elefant".to_string(),
            from_address: "noreply@elefant.test".to_string(),
            confirmation_template: "d-1".to_string(),
        }
    }

    #[test]
    fn test_sendgrid_requires_key() {
        let mut config = sendgrid_config();
        config.api_key.clear();
        assert!(matches!(
            SendGridSender::new(&config),
            Err(EmailError::NotConfigured("api_key"))
        ));
    }

    #[test]
    fn test_sendgrid_request_body() {
        let sender = SendGridSender::new(&sendgrid_config()).unwrap();
        let mut data = HashMap::new();
        data.insert("code".to_string(), "123456".to_string());
        let body = serde_json::to_value(sender.request("d-1", "ada@example.com", &data)).unwrap();
        assert_eq!(body["template_id"], "d-1");
        assert_eq!(body["from"]["email"], "noreply@elefant.test");
        assert_eq!(body["from"]["name"], "Elefant");
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "ada@example.com");
        assert!(body["personalizations"][0]["to"][0].get("name").is_none());
        assert_eq!(
            body["personalizations"][0]["dynamic_template_data"]["code"],
            "123456"
        );
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = from_config(&EmailConfig::default()).unwrap();
        assert!(sender.send("t", "a@b.c", &HashMap::new()).await.is_ok());
    }
}
