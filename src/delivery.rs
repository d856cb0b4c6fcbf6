use std::sync::Arc;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::error::error_chain_fmt;
use crate::render::RenderedMessage;

/// A message addressed to a whole recipient set, as handed to the provider.
#[derive(Debug, Clone)]
pub struct OutboundMessage<'a> {
    pub recipients: &'a [SubscriberEmail],
    pub subject: &'a str,
    pub text: &'a str,
    pub html: Option<&'a str>,
}

#[derive(thiserror::Error)]
pub enum TransportError {
    #[error("The email provider could not be reached or rejected the message.")]
    Provider(#[from] reqwest::Error),
    #[error("The message is not deliverable: {0}")]
    Undeliverable(String),
}

impl std::fmt::Debug for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Outbound email provider. A successful return means "accepted", not "delivered".
#[async_trait::async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage<'_>) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Success,
    Failure(String),
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success)
    }
}

/// Hands rendered campaigns to the transport. Retrying is up to the caller.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn EmailTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Dispatcher {
        Dispatcher { transport }
    }

    #[tracing::instrument(
        name = "Dispatch a message to the email provider",
        skip(self, recipients, message),
        fields(recipients = recipients.len())
    )]
    pub async fn dispatch(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        message: &RenderedMessage,
    ) -> DispatchResult {
        if recipients.is_empty() {
            return DispatchResult::Failure(String::from("message has no recipients"));
        }

        let outbound = OutboundMessage {
            recipients,
            subject,
            text: message.text.as_str(),
            html: Some(message.html.as_str()),
        };

        match self.transport.send(&outbound).await {
            Ok(()) => DispatchResult::Success,
            Err(err) => {
                tracing::warn!(
                    error.cause_chain = ?err,
                    "Email provider did not accept the message"
                );
                DispatchResult::Failure(failure_reason(&err))
            }
        }
    }
}

fn failure_reason(err: &TransportError) -> String {
    match err {
        TransportError::Provider(source) => match source.status() {
            Some(status) => format!("email provider answered with status {}", status),
            None if source.is_timeout() => String::from("email provider timed out"),
            None => String::from("email provider could not be reached"),
        },
        TransportError::Undeliverable(reason) => reason.clone(),
    }
}
