use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

use crate::clock::Clock;
use crate::domain::contact_message::{NewContactMessage, NewContactMessageBody};
use crate::error::{error_chain_fmt, error_response};
use crate::store::{ContactStore, StoreError};

#[derive(thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to store the contact message.")]
    Store(#[from] StoreError),
}

impl std::fmt::Debug for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ContactError {
    fn status_code(&self) -> StatusCode {
        match self {
            ContactError::Validation(_) => StatusCode::BAD_REQUEST,
            ContactError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ContactError::Validation(reason) => error_response(self.status_code(), reason),
            ContactError::Store(_) => error_response(self.status_code(), "Internal server error"),
        }
    }
}

#[tracing::instrument(
    name = "Store a contact message handler",
    skip(body, contacts, clock),
    fields(contact_email = %body.email)
)]
pub async fn handle_create_contact_message(
    body: web::Json<NewContactMessageBody>,
    contacts: web::Data<dyn ContactStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, ContactError> {
    let new_message: NewContactMessage = body.try_into().map_err(|err: String| {
        tracing::warn!("Validation error: {}", err);
        ContactError::Validation(err)
    })?;
    let message = new_message.into_message(clock.now());

    contacts.insert(&message).await.map_err(|err| {
        tracing::error!(error.cause_chain = ?err, "Failed to store a contact message");
        ContactError::Store(err)
    })?;

    Ok(HttpResponse::Created().json(message))
}

#[tracing::instrument(name = "List contact messages handler", skip(contacts))]
pub async fn list_contact_messages(
    contacts: web::Data<dyn ContactStore>,
) -> Result<HttpResponse, ContactError> {
    let messages = contacts.list().await.map_err(|err| {
        tracing::error!(error.cause_chain = ?err, "Failed to list contact messages");
        ContactError::Store(err)
    })?;

    Ok(HttpResponse::Ok().json(messages))
}
