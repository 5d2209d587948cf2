//! Notification email dispatch.
//!
//! Backends:
//! - `http`: POST a JSON message to a transactional mail API
//!   (`{ from, to, subject, html }` with a bearer API key)
//! - `log`: write the message to the log instead of sending it, for local dev
//!
//! A [`Mailer`] is built once at start-up and shared; it holds no state
//! beyond its connection settings.

use std::time::Duration;

use certificate_core::env::{positive_secs_var, var_non_empty};
use serde::Serialize;

/// Mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mailer config: {0}")]
    InvalidConfig(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("mail API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// An outgoing HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailerKind {
    Http,
    Log,
}

impl MailerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MailerKind::Http => "http",
            MailerKind::Log => "log",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpMailConfig {
    /// Endpoint that accepts the JSON message.
    pub api_url: String,
    /// Sent as `Authorization: Bearer <key>` when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum MailerBackendConfig {
    Http(HttpMailConfig),
    Log,
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub backend: MailerBackendConfig,
    /// Sender address.
    pub from: String,
}

impl MailerConfig {
    pub fn log(from: impl Into<String>) -> Self {
        Self {
            backend: MailerBackendConfig::Log,
            from: from.into(),
        }
    }

    pub fn http(from: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            backend: MailerBackendConfig::Http(HttpMailConfig {
                api_url: api_url.into(),
                api_key: None,
                timeout: Duration::from_secs(10),
            }),
            from: from.into(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        if let MailerBackendConfig::Http(http) = &mut self.backend {
            http.api_key = Some(key.into());
        }
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `MAIL_FROM` (required)
    /// - `MAIL_BACKEND` (`http` or `log`; default: `http` when `MAIL_API_URL` is set, else `log`)
    /// - `MAIL_API_URL` (required for `http`)
    /// - `MAIL_API_KEY` (optional)
    /// - `MAIL_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, MailError> {
        let from = var_non_empty("MAIL_FROM")
            .ok_or_else(|| MailError::InvalidConfig("MAIL_FROM is required".into()))?;
        let api_url = var_non_empty("MAIL_API_URL");

        let backend = match (var_non_empty("MAIL_BACKEND").as_deref(), api_url) {
            (Some("log"), _) | (None, None) => MailerBackendConfig::Log,
            (Some("http"), Some(api_url)) | (None, Some(api_url)) => {
                let timeout = positive_secs_var("MAIL_TIMEOUT_SECS")
                    .map_err(MailError::InvalidConfig)?
                    .unwrap_or(Duration::from_secs(10));
                MailerBackendConfig::Http(HttpMailConfig {
                    api_url,
                    api_key: var_non_empty("MAIL_API_KEY"),
                    timeout,
                })
            }
            (Some("http"), None) => {
                return Err(MailError::InvalidConfig(
                    "MAIL_API_URL is required for http backend".into(),
                ));
            }
            (Some(other), _) => {
                return Err(MailError::InvalidConfig(format!(
                    "unsupported MAIL_BACKEND={other} (expected http|log)"
                )));
            }
        };

        Ok(Self { backend, from })
    }
}

#[derive(Clone)]
enum Transport {
    Http {
        client: reqwest::Client,
        api_url: String,
        api_key: Option<String>,
    },
    Log,
}

/// JSON body sent to the mail API.
#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Shared handle for sending notification emails.
#[derive(Clone)]
pub struct Mailer {
    from: String,
    transport: Transport,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("kind", &self.kind())
            .field("from", &self.from)
            .finish()
    }
}

impl Mailer {
    pub fn new(config: MailerConfig) -> Result<Self, MailError> {
        if !config.from.contains('@') {
            return Err(MailError::InvalidConfig(format!(
                "sender address {:?} is not an email address",
                config.from
            )));
        }

        let transport = match config.backend {
            MailerBackendConfig::Http(http) => Transport::Http {
                client: reqwest::Client::builder().timeout(http.timeout).build()?,
                api_url: http.api_url,
                api_key: http.api_key,
            },
            MailerBackendConfig::Log => Transport::Log,
        };

        Ok(Self {
            from: config.from,
            transport,
        })
    }

    pub fn from_env() -> Result<Self, MailError> {
        Self::new(MailerConfig::from_env()?)
    }

    pub fn kind(&self) -> MailerKind {
        match self.transport {
            Transport::Http { .. } => MailerKind::Http,
            Transport::Log => MailerKind::Log,
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Send one email. Errors are returned, never retried.
    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        if !email.to.contains('@') {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }

        match &self.transport {
            Transport::Log => {
                tracing::info!(
                    to = %email.to,
                    subject = %email.subject,
                    "Mail backend is log-only, not sending"
                );
                Ok(())
            }
            Transport::Http {
                client,
                api_url,
                api_key,
            } => {
                let message = OutgoingMessage {
                    from: &self.from,
                    to: [email.to.as_str()],
                    subject: &email.subject,
                    html: &email.html,
                };

                let mut request = client.post(api_url).json(&message);
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }

                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(MailError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }

                tracing::debug!("Sent email to {}", email.to);
                Ok(())
            }
        }
    }
}
