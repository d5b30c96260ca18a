//! Outgoing mail - delivering CSV exports to a recipient.
//!
//! The HTTP transport POSTs one JSON message per export to a provider
//! endpoint with a bearer API key. Without a configured endpoint the message
//! is only logged.

use crate::{
    config::{secrets, settings::MailConfig},
    errors::{Error, Result},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const ATTACHMENT_NAME: &str = "data.csv";
const BODY_TEXT: &str = "Please find the attached CSV data.";
const USER_AGENT: &str = concat!("spinventory/", env!("CARGO_PKG_VERSION"));

/// A message as the provider receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
}

/// Mail transport.
#[derive(Debug, Clone)]
pub enum Mailer {
    /// Provider reachable over HTTPS
    Http {
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
        from: String,
        subject: String,
    },
    /// Log and drop
    Log { from: String, subject: String },
}

impl Mailer {
    /// Builds the transport described by `[mail]` and `MAIL_API_KEY`.
    ///
    /// # Errors
    /// Returns [`Error::Mail`] if the HTTP client cannot be built.
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let Some(endpoint) = config.endpoint.clone() else {
            info!("No mail endpoint configured, exports will only be logged");
            return Ok(Self::Log {
                from: config.from.clone(),
                subject: config.subject.clone(),
            });
        };

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::Http {
            client,
            endpoint,
            api_key: secrets::mail_api_key(),
            from: config.from.clone(),
            subject: config.subject.clone(),
        })
    }

    /// Log-only transport with default sender and subject.
    #[must_use]
    pub fn log_only() -> Self {
        let config = MailConfig::default();
        Self::Log {
            from: config.from,
            subject: config.subject,
        }
    }

    /// The message that would be sent to `to` with `csv` attached.
    #[must_use]
    pub fn compose(&self, to: &str, csv: &str) -> OutgoingMail {
        let (Self::Http { from, subject, .. } | Self::Log { from, subject }) = self;
        OutgoingMail {
            from: from.clone(),
            to: to.to_string(),
            subject: subject.clone(),
            text: BODY_TEXT.to_string(),
            attachments: vec![Attachment {
                filename: ATTACHMENT_NAME.to_string(),
                content: csv.to_string(),
            }],
        }
    }

    /// Sends `csv` to `to` as an attachment.
    ///
    /// # Errors
    /// Returns a validation error for a blank recipient and [`Error::Mail`]
    /// if the provider cannot be reached or refuses the message.
    pub async fn send_csv(&self, to: &str, csv: &str) -> Result<()> {
        if to.trim().is_empty() {
            return Err(Error::validation("Recipient email is required"));
        }
        let mail = self.compose(to.trim(), csv);

        match self {
            Self::Http {
                client,
                endpoint,
                api_key,
                ..
            } => {
                let mut request = client.post(endpoint).json(&mail);
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }
                request.send().await?.error_for_status()?;
                info!(to = %mail.to, "Export mail sent");
            }
            Self::Log { .. } => {
                info!(to = %mail.to, bytes = csv.len(), "Mail delivery not configured, dropping export");
                debug!(?mail, "Dropped mail");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_compose_attaches_csv() {
        let mail = Mailer::log_only().compose("a@x.com", "binId,count\n42,3\n");
        assert_eq!(mail.to, "a@x.com");
        assert_eq!(mail.subject, "Spinventory Export");
        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(mail.attachments[0].filename, "data.csv");
        assert_eq!(mail.attachments[0].content, "binId,count\n42,3\n");
    }

    #[test]
    fn test_without_endpoint_is_log_only() {
        let mailer = Mailer::from_config(&MailConfig::default()).unwrap();
        assert!(matches!(mailer, Mailer::Log { .. }));
    }

    #[tokio::test]
    async fn test_log_only_send() -> Result<()> {
        Mailer::log_only().send_csv("a@x.com", "x").await
    }

    #[tokio::test]
    async fn test_blank_recipient_rejected() {
        let result = Mailer::log_only().send_csv(" ", "x").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
