use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::delivery::{EmailTransport, OutboundMessage, TransportError};
use crate::domain::subscriber_email::SubscriberEmail;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody<'a> {
    personalizations: Vec<SengridPersonalization<'a>>,
    from: SengridEmail<'a>,
    subject: &'a str,
    content: Vec<SengridContent<'a>>,
}

#[derive(serde::Serialize)]
struct SengridEmail<'a> {
    email: &'a str,
}

// One personalization per recipient keeps the audience hidden from each other.
#[derive(serde::Serialize)]
struct SengridPersonalization<'a> {
    to: Vec<SengridEmail<'a>>,
}

#[derive(serde::Serialize)]
struct SengridContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
        })
    }

    #[tracing::instrument(
        name = "Send an email through the provider API",
        skip(self, recipients, text_content, html_content),
        fields(recipients = recipients.len())
    )]
    pub async fn send_email(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        text_content: &str,
        html_content: Option<&str>,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/mail/send", self.base_url);
        let mut content = vec![SengridContent {
            content_type: "text/plain",
            value: text_content,
        }];

        if let Some(html_content) = html_content {
            content.push(SengridContent {
                content_type: "text/html",
                value: html_content,
            });
        }

        let body = SendEmailBody {
            from: SengridEmail {
                email: self.sender.as_ref(),
            },
            personalizations: recipients
                .iter()
                .map(|recipient| SengridPersonalization {
                    to: vec![SengridEmail {
                        email: recipient.as_ref(),
                    }],
                })
                .collect(),
            subject,
            content,
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?; // return an error when server response status code is 4xx or 5xx

        Ok(())
    }
}

#[async_trait::async_trait]
impl EmailTransport for EmailClient {
    async fn send(&self, message: &OutboundMessage<'_>) -> Result<(), TransportError> {
        if message.recipients.is_empty() {
            return Err(TransportError::Undeliverable(String::from(
                "message has no recipients",
            )));
        }

        self.send_email(
            message.recipients,
            message.subject,
            message.text,
            message.html,
        )
        .await?;

        Ok(())
    }
}
