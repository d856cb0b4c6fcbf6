use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::campaign::Campaign;
use crate::domain::contact_message::ContactMessage;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::store::{
    CampaignStore, ContactStore, ReleaseOutcome, StoreError, SubscriberStore,
};

// The guarded sections never await, so a std mutex gives the same
// compare-and-set guarantee as a conditional UPDATE.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct InMemorySubscriberStore {
    subscribers: Mutex<Vec<Subscriber>>,
}

#[async_trait::async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn insert(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        let mut subscribers = lock(&self.subscribers);

        if subscribers.iter().any(|stored| stored.email == subscriber.email) {
            return Err(StoreError::Duplicate);
        }

        subscribers.push(subscriber.clone());

        Ok(())
    }

    async fn all(&self) -> Result<Vec<Subscriber>, StoreError> {
        let mut subscribers = lock(&self.subscribers).clone();
        subscribers.sort_by(|a, b| {
            a.subscribed_at
                .cmp(&b.subscribed_at)
                .then_with(|| a.email.cmp(&b.email))
        });

        Ok(subscribers)
    }

    async fn find_by_emails(
        &self,
        emails: &[SubscriberEmail],
    ) -> Result<Vec<Subscriber>, StoreError> {
        Ok(lock(&self.subscribers)
            .iter()
            .filter(|subscriber| emails.contains(&subscriber.email))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: Mutex<Vec<Campaign>>,
}

impl InMemoryCampaignStore {
    fn update<T>(&self, id: Uuid, apply: impl FnOnce(&mut Campaign) -> T) -> Option<T> {
        lock(&self.campaigns)
            .iter_mut()
            .find(|campaign| campaign.id == id)
            .map(apply)
    }
}

#[async_trait::async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut campaigns = lock(&self.campaigns);

        if campaigns.iter().any(|stored| stored.id == campaign.id) {
            return Err(StoreError::Duplicate);
        }

        campaigns.push(campaign.clone());

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        Ok(lock(&self.campaigns)
            .iter()
            .find(|campaign| campaign.id == id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Campaign>, StoreError> {
        let mut campaigns = lock(&self.campaigns).clone();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(campaigns)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let mut due: Vec<Campaign> = lock(&self.campaigns)
            .iter()
            .filter(|campaign| campaign.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|campaign| campaign.schedule_at.unwrap_or(campaign.created_at));

        Ok(due)
    }

    async fn find_stalled(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(lock(&self.campaigns)
            .iter()
            .filter(|campaign| {
                !campaign.sent
                    && matches!(campaign.dispatching_since, Some(since) if since < claimed_before)
            })
            .cloned()
            .collect())
    }

    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let claimed = self.update(id, |campaign| {
            if !campaign.is_due(now) {
                return false;
            }

            campaign.dispatching_since = Some(now);
            true
        });

        Ok(claimed.unwrap_or(false))
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let marked = self.update(id, |campaign| {
            if campaign.sent {
                return false;
            }

            campaign.sent = true;
            campaign.sent_at = Some(sent_at);
            campaign.dispatching_since = None;
            true
        });

        Ok(marked.unwrap_or(false))
    }

    async fn release(
        &self,
        id: Uuid,
        reason: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<ReleaseOutcome>, StoreError> {
        let outcome = self.update(id, |campaign| {
            if campaign.sent {
                return None;
            }

            campaign.dispatching_since = None;
            campaign.attempts += 1;
            campaign.last_error = Some(reason.to_string());
            campaign.failed_at = if campaign.attempts >= max_attempts {
                Some(now)
            } else {
                None
            };

            Some(ReleaseOutcome {
                attempts: campaign.attempts,
                gave_up: campaign.failed_at.is_some(),
            })
        });

        Ok(outcome.flatten())
    }
}

#[derive(Default)]
pub struct InMemoryContactStore {
    messages: Mutex<Vec<ContactMessage>>,
}

#[async_trait::async_trait]
impl ContactStore for InMemoryContactStore {
    async fn insert(&self, message: &ContactMessage) -> Result<(), StoreError> {
        lock(&self.messages).push(message.clone());

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let mut messages = lock(&self.messages).clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(messages)
    }
}
