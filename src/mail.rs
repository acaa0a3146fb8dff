//! Send emails to users for important updates.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};

use crate::config::{Configuration, Mail};
use crate::error::{Result, ServerError};

/// A single outbound email.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    /// Exactly one recipient per message.
    pub to_email: String,
}

/// Transport seam delivering outbound emails.
///
/// Protocol, port and authentication are entirely the gateway's concern.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Deliver one message to `to` on behalf of `from`.
    async fn send(
        &self,
        subject: &str,
        body: &str,
        from: &str,
        to: &[String],
    ) -> Result<()>;
}

/// SMTP mail gateway.
pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpGateway {
    /// Create a new [`SmtpGateway`] from configuration.
    pub fn new(config: &Mail) -> Result<Self> {
        let mut builder = if config.tls.unwrap_or(true) {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.address)
                .map_err(ServerError::transport)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                &config.address,
            )
        };

        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        if let (Some(username), Some(password)) =
            (&config.username, &config.password)
        {
            builder = builder
                .credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(hostname = %config.address, "smtp relay configured");

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl MailGateway for SmtpGateway {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        from: &str,
        to: &[String],
    ) -> Result<()> {
        let mut message = Message::builder()
            .from(from.parse().map_err(ServerError::transport)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        for recipient in to {
            message =
                message.to(recipient.parse().map_err(ServerError::transport)?);
        }

        let message = message
            .body(body.to_string())
            .map_err(ServerError::transport)?;

        self.transport
            .send(message)
            .await
            .map_err(ServerError::transport)?;

        tracing::trace!(%from, "mail dispatched");

        Ok(())
    }
}

/// Formats and dispatches notification emails.
///
/// One gateway call per message: no retry, no queue, no batching. The
/// sender address is re-resolved from the shared configuration on every
/// call.
pub struct Notifier<G> {
    config: Arc<Configuration>,
    gateway: G,
}

impl<G: MailGateway> Notifier<G> {
    /// Create a new [`Notifier`].
    pub fn new(config: Arc<Configuration>, gateway: G) -> Self {
        Self { config, gateway }
    }

    /// Dispatch one email to a single recipient.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MissingSender`] when the configuration has
    /// no `mail` entry, and propagates gateway failures unchanged.
    pub async fn send_mail(&self, message: &EmailMessage) -> Result<()> {
        let from = self
            .config
            .mail
            .as_ref()
            .map(|mail| mail.email_from.as_str())
            .ok_or(ServerError::MissingSender)?;

        self.gateway
            .send(
                &message.subject,
                &message.body,
                from,
                std::slice::from_ref(&message.to_email),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sent {
        subject: String,
        body: String,
        from: String,
        to: Vec<String>,
    }

    /// Gateway recording every delivery instead of sending it.
    #[derive(Clone, Default)]
    struct RecordingGateway {
        sent: Arc<Mutex<Vec<Sent>>>,
        failing: bool,
    }

    impl RecordingGateway {
        fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailGateway for RecordingGateway {
        async fn send(
            &self,
            subject: &str,
            body: &str,
            from: &str,
            to: &[String],
        ) -> Result<()> {
            if self.failing {
                return Err(ServerError::transport(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }

            self.sent.lock().unwrap().push(Sent {
                subject: subject.to_string(),
                body: body.to_string(),
                from: from.to_string(),
                to: to.to_vec(),
            });

            Ok(())
        }
    }

    fn config_with_sender(email_from: &str) -> Arc<Configuration> {
        let mut config = Configuration::default();
        config.mail = Some(Mail {
            email_from: email_from.to_string(),
            address: "smtp.example.com".to_string(),
            ..Default::default()
        });
        Arc::new(config)
    }

    fn message() -> EmailMessage {
        EmailMessage {
            subject: "S".to_string(),
            body: "B".to_string(),
            to_email: "x@y.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_mail_uses_configured_sender() {
        let gateway = RecordingGateway::default();
        let notifier = Notifier::new(
            config_with_sender("noreply@example.com"),
            gateway.clone(),
        );

        notifier.send_mail(&message()).await.unwrap();

        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            Sent {
                subject: "S".to_string(),
                body: "B".to_string(),
                from: "noreply@example.com".to_string(),
                to: vec!["x@y.com".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_send_mail_resolves_sender_each_call() {
        let gateway = RecordingGateway::default();

        let notifier = Notifier::new(
            config_with_sender("first@example.com"),
            gateway.clone(),
        );
        notifier.send_mail(&message()).await.unwrap();

        let notifier = Notifier::new(
            config_with_sender("second@example.com"),
            gateway.clone(),
        );
        notifier.send_mail(&message()).await.unwrap();

        let sent = gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].from, "first@example.com");
        assert_eq!(sent[1].from, "second@example.com");
    }

    #[tokio::test]
    async fn test_send_mail_without_sender_configured() {
        let gateway = RecordingGateway::default();
        let notifier =
            Notifier::new(Arc::new(Configuration::default()), gateway.clone());

        let err = notifier.send_mail(&message()).await.unwrap_err();
        assert!(matches!(err, ServerError::MissingSender));

        // The gateway was never reached.
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let gateway = RecordingGateway::failing();
        let notifier = Notifier::new(
            config_with_sender("noreply@example.com"),
            gateway.clone(),
        );

        let err = notifier.send_mail(&message()).await.unwrap_err();
        assert!(matches!(err, ServerError::Transport(_)));
    }
}
