//! SMTP email notifier
//!
//! `securityType` selects how the session is protected:
//!
//! | `securityType` | Transport                          | Default port |
//! |----------------|------------------------------------|--------------|
//! | `SSL`          | implicit TLS from the first byte   | 465          |
//! | `TLS`          | plain connect, then `STARTTLS`     | 587          |
//!
//! `smtpServer` is `host` or `host:port`. Credentials are sent with
//! `AUTH PLAIN`/`LOGIN` when a username is configured.

use async_trait::async_trait;
use ddns_core::config::{EmailAddress, EmailConfig, NotificationConfig};
use ddns_core::traits::{ChangeNotice, Notifier, NotifierFactory};
use ddns_core::{Error, Result};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    Ssl,
    StartTls,
}

impl Security {
    fn parse(security_type: &str) -> Result<Self> {
        match security_type.trim().to_ascii_uppercase().as_str() {
            "SSL" => Ok(Security::Ssl),
            "TLS" => Ok(Security::StartTls),
            other => Err(Error::config(format!(
                "email securityType must be 'SSL' or 'TLS', got '{}'",
                other
            ))),
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Security::Ssl => 465,
            Security::StartTls => 587,
        }
    }
}

/// Split `host[:port]`, falling back to the port of the security type
fn split_server(server: &str, security: Security) -> Result<(&str, u16)> {
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse()
                .map_err(|_| Error::config(format!("Invalid smtpServer port in '{}'", server)))?;
            Ok((host, port))
        }
        Some(_) => Err(Error::config(format!("Invalid smtpServer '{}'", server))),
        None => Ok((server, security.default_port())),
    }
}

fn mailbox(address: &EmailAddress) -> Result<Mailbox> {
    let parsed = address
        .address
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("Invalid email address '{}': {}", address.address, e)))?;
    let name = Some(address.name.trim().to_string()).filter(|n| !n.is_empty());
    Ok(Mailbox::new(name, parsed))
}

pub struct EmailNotifier {
    smtp_server: String,
    from: Mailbox,
    recipients: Vec<Mailbox>,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("smtp_server", &self.smtp_server)
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .finish_non_exhaustive()
    }
}

impl EmailNotifier {
    /// Create a notifier from an enabled `email` block
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        if config.smtp_server.trim().is_empty() {
            return Err(Error::config("email requires 'smtpServer'"));
        }
        let from = config
            .from
            .as_ref()
            .ok_or_else(|| Error::config("email requires 'from'"))
            .and_then(mailbox)?;
        if config.recipients.is_empty() {
            return Err(Error::config("email requires at least one recipient"));
        }
        let recipients = config
            .recipients
            .iter()
            .map(mailbox)
            .collect::<Result<Vec<_>>>()?;

        let security = Security::parse(&config.security_type)?;
        let (host, port) = split_server(config.smtp_server.trim(), security)?;

        let builder = match security {
            Security::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        }
        .map_err(|e| Error::config(format!("Invalid smtpServer '{}': {}", host, e)))?;

        let mut builder = builder.port(port).timeout(Some(DEFAULT_SMTP_TIMEOUT));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            smtp_server: format!("{}:{}", host, port),
            from,
            recipients,
            mailer: builder.build(),
        })
    }

    fn message(&self, notice: &ChangeNotice) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(notice.render())
            .map_err(|e| Error::notify(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notice: &ChangeNotice) -> Result<()> {
        let message = self.message(notice)?;
        self.mailer.send(message).await.map_err(|e| {
            Error::notify(format!("email via {} failed: {}", self.smtp_server, e))
        })?;

        tracing::info!(
            server = %self.smtp_server,
            recipients = self.recipients.len(),
            "Email notification sent"
        );
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "email"
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmailFactory;

impl EmailFactory {
    pub fn new() -> Self {
        Self
    }
}

impl NotifierFactory for EmailFactory {
    fn create(&self, config: &NotificationConfig) -> Result<Option<Box<dyn Notifier>>> {
        if !config.email.enabled {
            return Ok(None);
        }
        Ok(Some(Box::new(EmailNotifier::from_config(&config.email)?)))
    }
}
