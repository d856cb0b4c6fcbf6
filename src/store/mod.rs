use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::campaign::Campaign;
use crate::domain::contact_message::ContactMessage;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::error::error_chain_fmt;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCampaignStore, InMemoryContactStore, InMemorySubscriberStore};
pub use postgres::{PgCampaignStore, PgContactStore, PgSubscriberStore};

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("A record with the same key already exists.")]
    Duplicate,
    #[error("Failed to execute a query against the database.")]
    Database(#[source] sqlx::Error),
    #[error("A stored record could not be read back: {0}")]
    Corrupted(String),
    #[error("A value does not fit the storage schema: {0}")]
    InvalidInput(String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// What happened to a campaign handed back after a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub attempts: u32,
    pub gave_up: bool,
}

#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the email is already subscribed.
    async fn insert(&self, subscriber: &Subscriber) -> Result<(), StoreError>;

    /// Every subscriber, oldest subscription first.
    async fn all(&self) -> Result<Vec<Subscriber>, StoreError>;

    async fn find_by_emails(&self, emails: &[SubscriberEmail])
        -> Result<Vec<Subscriber>, StoreError>;
}

/// Campaign persistence. Every state transition is a conditional update that reports whether
/// it took effect, so two callers racing on the same campaign cannot both win.
#[async_trait::async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<Campaign>, StoreError>;

    /// Every campaign, newest first.
    async fn list(&self) -> Result<Vec<Campaign>, StoreError>;

    /// Unsent, unclaimed, not failed campaigns whose schedule has arrived (or that have none).
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError>;

    /// Campaigns claimed for dispatch before `claimed_before` that never reported back.
    async fn find_stalled(&self, claimed_before: DateTime<Utc>)
        -> Result<Vec<Campaign>, StoreError>;

    /// Due → Dispatching. Returns `false` when the campaign is not due at `now` any more.
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Sets `sent = true` where `sent = false`. Returns `false` when it was already sent.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Dispatching → Due after a failed dispatch, or → Failed once `max_attempts` is reached.
    /// Returns `None` when the campaign is already sent or does not exist.
    async fn release(
        &self,
        id: Uuid,
        reason: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<ReleaseOutcome>, StoreError>;
}

#[async_trait::async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert(&self, message: &ContactMessage) -> Result<(), StoreError>;

    /// Every message, newest first.
    async fn list(&self) -> Result<Vec<ContactMessage>, StoreError>;
}

/// The set of stores the application runs against.
#[derive(Clone)]
pub struct Storage {
    pub subscribers: Arc<dyn SubscriberStore>,
    pub campaigns: Arc<dyn CampaignStore>,
    pub contacts: Arc<dyn ContactStore>,
}

impl Storage {
    pub fn postgres(db_pool: PgPool) -> Storage {
        Storage {
            subscribers: Arc::new(PgSubscriberStore::new(db_pool.clone())),
            campaigns: Arc::new(PgCampaignStore::new(db_pool.clone())),
            contacts: Arc::new(PgContactStore::new(db_pool)),
        }
    }

    pub fn in_memory() -> Storage {
        Storage {
            subscribers: Arc::new(InMemorySubscriberStore::default()),
            campaigns: Arc::new(InMemoryCampaignStore::default()),
            contacts: Arc::new(InMemoryContactStore::default()),
        }
    }
}
