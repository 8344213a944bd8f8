//! Notifier: plain-text alert emails through an authenticated relay.
//!
//! Every call opens its own relay session (connect, authenticate, send,
//! disconnect). Delivery is best-effort: [`Notifier::notify`] logs a failed
//! submission and returns, so one bad send never stops an alert scan.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{error, info};

use crate::config::{resolve_secret, MailConfig, SmtpSecurity};
use crate::errors::{NotifyError, WatchResult};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Submit one message to every address in `recipients`.
    async fn send(&self, recipients: &[String], subject: &str, body: &str)
        -> Result<(), NotifyError>;

    /// Best-effort wrapper around [`Notifier::send`].
    ///
    /// Failures are logged and swallowed. Returns whether the relay
    /// accepted the message.
    async fn notify(&self, recipients: &[String], subject: &str, body: &str) -> bool {
        match self.send(recipients, subject, body).await {
            Ok(()) => {
                info!(recipients = ?recipients, %subject, "alert email sent");
                true
            }
            Err(e) => {
                error!(recipients = ?recipients, %subject, "email error: {e}");
                false
            }
        }
    }
}

/// Build the plain-text message. The recipient list is used verbatim.
pub fn build_message(
    sender: &str,
    recipients: &[String],
    subject: &str,
    body: &str,
) -> Result<Message, NotifyError> {
    if recipients.is_empty() {
        return Err(NotifyError::InvalidRecipient(
            "no recipients given".to_string(),
        ));
    }

    let from: Mailbox = sender
        .parse()
        .map_err(|e| NotifyError::InvalidRecipient(format!("sender '{sender}': {e}")))?;

    let mut builder = Message::builder()
        .from(from)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);

    for recipient in recipients {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| NotifyError::InvalidRecipient(format!("'{recipient}': {e}")))?;
        builder = builder.to(to);
    }

    builder
        .body(body.to_string())
        .map_err(|e| NotifyError::SubmissionError(format!("failed to build message: {e}")))
}

/// Classify a relay reply code. 53x replies are authentication failures.
fn error_for_reply_code(code: Option<&str>, detail: String) -> NotifyError {
    match code {
        Some(code) if code.starts_with("53") => NotifyError::AuthError(detail),
        _ => NotifyError::SubmissionError(detail),
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> NotifyError {
    let code = err.status().map(|code| code.to_string());
    error_for_reply_code(code.as_deref(), err.to_string())
}

/// Notifier backed by an SMTP relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    sender: String,
    credentials: Credentials,
    relay: String,
    port: u16,
    security: SmtpSecurity,
    timeout: Duration,
}

impl SmtpNotifier {
    /// Build from the mail section of the configuration.
    ///
    /// The password may use the `env:VAR_NAME` indirection.
    pub fn new(config: &MailConfig) -> WatchResult<Self> {
        let password = resolve_secret(&config.password)?;

        // The relay's TLS config is built from the process-wide provider.
        // Another caller may already have installed one, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        Ok(Self {
            sender: config.sender.clone(),
            credentials: Credentials::new(config.sender.clone(), password),
            relay: config.smtp_server.clone(),
            port: config.smtp_port,
            security: config.security,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let builder = match self.security {
            SmtpSecurity::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.relay),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.relay)
            }
        }
        .map_err(|e| NotifyError::SubmissionError(format!("relay {}: {e}", self.relay)))?;

        Ok(builder
            .port(self.port)
            .credentials(self.credentials.clone())
            .timeout(Some(self.timeout))
            .build())
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("sender", &self.sender)
            .field("relay", &self.relay)
            .field("port", &self.port)
            .field("security", &self.security)
            .finish()
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let message = build_message(&self.sender, recipients, subject, body)?;
        let transport = self.transport()?;

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_message_addresses_every_recipient() {
        let message = build_message(
            "notify@example.com",
            &recipients(&["ops@example.com", "sec@example.com"]),
            "License Expiry Warning: ProLicense",
            "The license 'ProLicense' is expiring on 2026-10-21.",
        )
        .unwrap();

        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 2);
        assert_eq!(
            envelope.from().map(|a| a.to_string()),
            Some("notify@example.com".to_string())
        );

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: License Expiry Warning: ProLicense"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn build_message_keeps_duplicate_recipients() {
        let message = build_message(
            "notify@example.com",
            &recipients(&["ops@example.com", "ops@example.com"]),
            "subject",
            "body",
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert_eq!(raw.matches("ops@example.com").count(), 2);
    }

    #[test]
    fn build_message_rejects_bad_addresses() {
        let result = build_message(
            "notify@example.com",
            &recipients(&["not-an-address"]),
            "subject",
            "body",
        );
        assert!(matches!(result, Err(NotifyError::InvalidRecipient(_))));

        let result = build_message("notify@example.com", &[], "subject", "body");
        assert!(matches!(result, Err(NotifyError::InvalidRecipient(_))));
    }

    #[test]
    fn auth_reply_codes_are_auth_errors() {
        assert!(matches!(
            error_for_reply_code(Some("535"), "authentication failed".to_string()),
            NotifyError::AuthError(_)
        ));
        assert!(matches!(
            error_for_reply_code(Some("530"), "authentication required".to_string()),
            NotifyError::AuthError(_)
        ));
    }

    #[test]
    fn other_reply_codes_are_submission_errors() {
        for code in [Some("550"), Some("421"), Some("554"), None] {
            assert!(matches!(
                error_for_reply_code(code, "rejected".to_string()),
                NotifyError::SubmissionError(_)
            ));
        }
    }

    #[tokio::test]
    async fn notify_swallows_transport_failures() {
        let notifier = SmtpNotifier::new(&MailConfig {
            sender: "notify@example.com".to_string(),
            password: "secret".to_string(),
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 1,
            security: SmtpSecurity::StartTls,
            timeout_secs: 2,
        })
        .unwrap();

        let to = recipients(&["ops@example.com"]);
        let result = notifier.send(&to, "subject", "body").await;
        assert!(matches!(result, Err(NotifyError::SubmissionError(_))));

        assert!(!notifier.notify(&to, "subject", "body").await);
    }
}
