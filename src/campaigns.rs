use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::audience::{AudienceError, AudienceResolver};
use crate::clock::Clock;
use crate::domain::campaign::Campaign;
use crate::domain::new_campaign::NewCampaign;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::error::error_chain_fmt;
use crate::scheduler::{CampaignScheduler, DeliveryOutcome};
use crate::store::{CampaignStore, StoreError};

/// Where a campaign stands right after it was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Sent,
    Scheduled,
    /// The immediate dispatch failed; the scheduler will retry.
    Retrying,
    Failed,
    /// A scheduler tick claimed the campaign first.
    Queued,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReceipt {
    pub id: Uuid,
    pub recipients: usize,
    pub not_found: Vec<SubscriberEmail>,
    pub status: ReceiptStatus,
    pub schedule_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(thiserror::Error)]
pub enum CreateCampaignError {
    #[error("An explicit target needs at least one email.")]
    InvalidTarget,
    #[error("None of the targeted addresses are subscribed.")]
    NoRecipients { not_found: Vec<SubscriberEmail> },
    #[error("Failed to access the campaign storage.")]
    Store(#[from] StoreError),
    #[error("The delivery task did not complete.")]
    DeliveryTask(#[source] tokio::task::JoinError),
}

impl std::fmt::Debug for CreateCampaignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<AudienceError> for CreateCampaignError {
    fn from(err: AudienceError) -> Self {
        match err {
            AudienceError::InvalidTarget => CreateCampaignError::InvalidTarget,
            AudienceError::Store(err) => CreateCampaignError::Store(err),
        }
    }
}

/// Accepts campaigns and sends the ones that are due right away.
pub struct CampaignService {
    resolver: AudienceResolver,
    campaigns: Arc<dyn CampaignStore>,
    scheduler: Arc<CampaignScheduler>,
    clock: Arc<dyn Clock>,
}

impl CampaignService {
    pub fn new(
        resolver: AudienceResolver,
        campaigns: Arc<dyn CampaignStore>,
        scheduler: Arc<CampaignScheduler>,
        clock: Arc<dyn Clock>,
    ) -> CampaignService {
        CampaignService {
            resolver,
            campaigns,
            scheduler,
            clock,
        }
    }

    #[tracing::instrument(name = "Create a campaign", skip(self, new_campaign))]
    pub async fn create(
        &self,
        new_campaign: NewCampaign,
    ) -> Result<CampaignReceipt, CreateCampaignError> {
        let audience = self.resolver.resolve(&new_campaign.target).await?;

        if audience.recipients.is_empty() {
            return Err(CreateCampaignError::NoRecipients {
                not_found: audience.not_found,
            });
        }

        let now = self.clock.now();
        let campaign = Campaign::new(
            audience.recipients,
            new_campaign.content,
            new_campaign.schedule_at,
            now,
        );

        self.campaigns.insert(&campaign).await?;

        tracing::info!(
            campaign_id = %campaign.id,
            recipients = campaign.recipients.len(),
            not_found = audience.not_found.len(),
            "Campaign accepted"
        );

        let mut receipt = CampaignReceipt {
            id: campaign.id,
            recipients: campaign.recipients.len(),
            not_found: audience.not_found,
            status: ReceiptStatus::Scheduled,
            schedule_at: campaign.schedule_at,
            sent_at: None,
        };

        if campaign.is_scheduled_for_later(now) {
            return Ok(receipt);
        }

        // Detached so a dropped request cannot abandon a claimed campaign mid-dispatch
        let scheduler = self.scheduler.clone();
        let delivery = tokio::spawn(
            async move { scheduler.deliver(&campaign).await }.instrument(tracing::Span::current()),
        );
        let outcome = delivery.await.map_err(|err| {
            tracing::error!(error.cause_chain = ?err, "Campaign delivery task failed");
            CreateCampaignError::DeliveryTask(err)
        })??;

        match outcome {
            DeliveryOutcome::Sent { sent_at } => {
                receipt.status = ReceiptStatus::Sent;
                receipt.sent_at = Some(sent_at);
            }
            DeliveryOutcome::Retrying { .. } => receipt.status = ReceiptStatus::Retrying,
            DeliveryOutcome::GaveUp { .. } => receipt.status = ReceiptStatus::Failed,
            DeliveryOutcome::Skipped => receipt.status = ReceiptStatus::Queued,
        }

        Ok(receipt)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        self.campaigns.find(id).await
    }

    pub async fn list(&self) -> Result<Vec<Campaign>, StoreError> {
        self.campaigns.list().await
    }
}
