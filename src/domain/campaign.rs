use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::campaign_state::CampaignState;
use crate::domain::campaign_text::CampaignText;
use crate::domain::campaign_url::CampaignUrl;
use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignContent {
    pub subject: CampaignText,
    pub title: CampaignText,
    #[serde(rename = "content")]
    pub body: CampaignText,
    pub cta_text: CampaignText,
    pub cta_url: CampaignUrl,
    pub image_url: Option<CampaignUrl>,
}

/// A newsletter send job. `recipients` is a snapshot taken when the campaign was accepted.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub recipients: Vec<SubscriberEmail>,
    #[serde(flatten)]
    pub content: CampaignContent,
    pub schedule_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub dispatching_since: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn new(
        recipients: Vec<SubscriberEmail>,
        content: CampaignContent,
        schedule_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            recipients,
            content,
            schedule_at,
            created_at,
            sent: false,
            sent_at: None,
            dispatching_since: None,
            attempts: 0,
            last_error: None,
            failed_at: None,
        }
    }

    pub fn is_scheduled_for_later(&self, now: DateTime<Utc>) -> bool {
        matches!(self.schedule_at, Some(schedule_at) if schedule_at > now)
    }

    pub fn state(&self, now: DateTime<Utc>) -> CampaignState {
        if self.sent {
            CampaignState::Sent
        } else if self.failed_at.is_some() {
            CampaignState::Failed
        } else if self.dispatching_since.is_some() {
            CampaignState::Dispatching
        } else if self.is_scheduled_for_later(now) {
            CampaignState::PendingFuture
        } else {
            CampaignState::Due
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state(now).is_due()
    }
}
