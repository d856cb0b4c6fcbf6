use actix_web::web;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::campaign_text::CampaignText;
use crate::domain::subscriber_email::SubscriberEmail;

const MAX_PHONE_LENGTH: usize = 32;
const MAX_MESSAGE_LENGTH: usize = 5_000;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: CampaignText,
    pub email: SubscriberEmail,
    pub phone: CampaignText,
    pub message: CampaignText,
    pub created_at: DateTime<Utc>,
}

pub struct NewContactMessage {
    pub name: CampaignText,
    pub email: SubscriberEmail,
    pub phone: CampaignText,
    pub message: CampaignText,
}

#[derive(Deserialize)]
pub struct NewContactMessageBody {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

impl TryFrom<web::Json<NewContactMessageBody>> for NewContactMessage {
    type Error = String;

    fn try_from(body: web::Json<NewContactMessageBody>) -> Result<Self, Self::Error> {
        let body = body.into_inner();
        let name = CampaignText::short(body.name).map_err(|err| format!("name: {}", err))?;
        let email = SubscriberEmail::parse(body.email)?;
        let phone = CampaignText::parse(body.phone, MAX_PHONE_LENGTH)
            .map_err(|err| format!("phone: {}", err))?;
        let message = CampaignText::parse(body.message, MAX_MESSAGE_LENGTH)
            .map_err(|err| format!("message: {}", err))?;

        Ok(NewContactMessage {
            name,
            email,
            phone,
            message,
        })
    }
}

impl NewContactMessage {
    pub fn into_message(self, created_at: DateTime<Utc>) -> ContactMessage {
        ContactMessage {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            phone: self.phone,
            message: self.message,
            created_at,
        }
    }
}
