use chrono::{DateTime, Utc};

use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: SubscriberEmail,
    pub subscribed_at: DateTime<Utc>,
}
