//! Outgoing e-mail for password resets.
//!
//! SMTP delivery goes through `lettre` when an SMTP host is configured;
//! otherwise messages are written to the log.

use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

use crate::core::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub fn password_reset_email(config: &AppConfig, to: &str, token: &str) -> OutgoingEmail {
    let link = config.reset_link(token);
    let body = format!(
        r#"We received a request to reset the password for your account.

Open the link below to choose a new password:
{}

The link expires in {} minutes. If you did not ask for a reset you can ignore this email."#,
        link, config.reset_token_expiry_minutes
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password reset".to_string(),
        body,
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        warn!(
            "SMTP not configured; email to {} not delivered. Subject: {}\n{}",
            email.to, email.subject, email.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod memory {
    use super::*;
    use std::sync::Mutex;

    /// Keeps sent messages in memory.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryMailer {
        sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    }

    impl MemoryMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Mailer for MemoryMailer {
        fn name(&self) -> &'static str {
            "memory"
        }

        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            self.sent
                .lock()
                .map_err(|e| MailError::Transport(e.to_string()))?
                .push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
pub use memory::MemoryMailer;

#[cfg(feature = "mail")]
mod smtp {
    use super::*;
    use lettre::{
        message::{header::ContentType, Message},
        transport::smtp::authentication::Credentials,
        SmtpTransport, Transport,
    };

    pub struct SmtpMailer {
        transport: SmtpTransport,
        from: String,
    }

    impl SmtpMailer {
        pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
            let host = config.smtp_host.clone().unwrap_or_default();
            let builder = match (&config.smtp_user, &config.smtp_password) {
                (Some(user), Some(pass)) => SmtpTransport::starttls_relay(&host)
                    .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
                    .credentials(Credentials::new(user.clone(), pass.clone())),
                _ => SmtpTransport::builder_dangerous(&host),
            };
            Ok(Self {
                transport: builder.port(config.smtp_port).build(),
                from: config.smtp_from.clone(),
            })
        }
    }

    #[async_trait]
    impl Mailer for SmtpMailer {
        fn name(&self) -> &'static str {
            "smtp"
        }

        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            let message = Message::builder()
                .from(
                    self.from
                        .parse()
                        .map_err(|e| MailError::Address(format!("from: {e}")))?,
                )
                .to(email
                    .to
                    .parse()
                    .map_err(|e| MailError::Address(format!("to: {e}")))?)
                .subject(email.subject)
                .header(ContentType::TEXT_PLAIN)
                .body(email.body)
                .map_err(|e| MailError::Build(e.to_string()))?;

            let transport = self.transport.clone();
            tokio::task::spawn_blocking(move || transport.send(&message))
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?
                .map_err(|e| MailError::Transport(e.to_string()))?;
            log::info!("Email sent to {}", email.to);
            Ok(())
        }
    }
}

#[cfg(feature = "mail")]
pub use smtp::SmtpMailer;

/// SMTP mailer when configured, otherwise the logging mailer.
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if config.smtp_configured() {
        #[cfg(feature = "mail")]
        {
            return Ok(Arc::new(SmtpMailer::from_config(config)?));
        }
        #[cfg(not(feature = "mail"))]
        warn!("SMTP host configured but the mail feature is disabled");
    }
    Ok(Arc::new(LogMailer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_email_contains_link() {
        let config = AppConfig {
            frontend_base_url: "https://pensions.example.com".into(),
            ..AppConfig::default()
        };
        let email = password_reset_email(&config, "ops@example.com", "tok123");
        assert_eq!(email.to, "ops@example.com");
        assert!(email
            .body
            .contains("https://pensions.example.com/reset-password?token=tok123"));
        assert!(email.body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer
            .send(OutgoingEmail {
                to: "a@example.com".into(),
                subject: "s".into(),
                body: "b".into(),
            })
            .await
            .expect("send");
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_log_mailer_without_smtp() {
        let mailer = mailer_from_config(&AppConfig::default()).expect("mailer");
        assert_eq!(mailer.name(), "log");
    }
}
