use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

use crate::clock::Clock;
use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::domain::subscriber::Subscriber;
use crate::error::{error_chain_fmt, error_response};
use crate::store::{StoreError, SubscriberStore};

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("{0}")]
    Validation(String),
    #[error("This email is already subscribed.")]
    DuplicateSubscriber,
    #[error("Failed to store the subscriber.")]
    Store(#[source] StoreError),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<StoreError> for SubscribeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => SubscribeError::DuplicateSubscriber,
            err => SubscribeError::Store(err),
        }
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscribeError::Validation(_) => StatusCode::BAD_REQUEST,
            SubscribeError::DuplicateSubscriber => StatusCode::CONFLICT,
            SubscribeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            SubscribeError::Store(_) => error_response(self.status_code(), "Internal server error"),
            _ => error_response(self.status_code(), &self.to_string()),
        }
    }
}

#[tracing::instrument(
    name = "Creating a new subscriber handler",
    skip(body, subscribers, clock),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_create_subscription(
    body: web::Json<NewSubscriberBody>,
    subscribers: web::Data<dyn SubscriberStore>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, SubscribeError> {
    let new_subscriber: NewSubscriber = body.try_into().map_err(|err: String| {
        tracing::warn!("Validation error: {}", err);
        SubscribeError::Validation(err)
    })?;
    let subscriber = Subscriber {
        email: new_subscriber.email,
        subscribed_at: clock.now(),
    };

    subscribers.insert(&subscriber).await.map_err(|err| {
        let err = SubscribeError::from(err);
        if let SubscribeError::Store(_) = err {
            tracing::error!(error.cause_chain = ?err, "Failed to insert new subscriber");
        }
        err
    })?;

    Ok(HttpResponse::Created().json(subscriber))
}

#[tracing::instrument(name = "List subscribers handler", skip(subscribers))]
pub async fn list_subscribers(
    subscribers: web::Data<dyn SubscriberStore>,
) -> Result<HttpResponse, SubscribeError> {
    let mut all = subscribers.all().await.map_err(|err| {
        tracing::error!(error.cause_chain = ?err, "Failed to list subscribers");
        SubscribeError::Store(err)
    })?;
    // Newest first
    all.reverse();

    Ok(HttpResponse::Ok().json(all))
}
