use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::audience_target::AudienceTarget;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::error::error_chain_fmt;
use crate::store::{StoreError, SubscriberStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAudience {
    pub recipients: Vec<SubscriberEmail>,
    pub not_found: Vec<SubscriberEmail>,
}

#[derive(thiserror::Error)]
pub enum AudienceError {
    #[error("An explicit target needs at least one email.")]
    InvalidTarget,
    #[error("Failed to read the audience.")]
    Store(#[from] StoreError),
}

impl std::fmt::Debug for AudienceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Turns a campaign target into the concrete list of subscribed recipients. Read-only.
#[derive(Clone)]
pub struct AudienceResolver {
    subscribers: Arc<dyn SubscriberStore>,
}

impl AudienceResolver {
    pub fn new(subscribers: Arc<dyn SubscriberStore>) -> AudienceResolver {
        AudienceResolver { subscribers }
    }

    #[tracing::instrument(name = "Resolve a campaign audience", skip(self, target))]
    pub async fn resolve(
        &self,
        target: &AudienceTarget,
    ) -> Result<ResolvedAudience, AudienceError> {
        match target {
            AudienceTarget::All => {
                let recipients = self
                    .subscribers
                    .all()
                    .await?
                    .into_iter()
                    .map(|subscriber| subscriber.email)
                    .collect();

                Ok(ResolvedAudience {
                    recipients,
                    not_found: vec![],
                })
            }
            AudienceTarget::Explicit(emails) => {
                let requested = dedup(emails);

                if requested.is_empty() {
                    return Err(AudienceError::InvalidTarget);
                }

                let subscribed: HashSet<SubscriberEmail> = self
                    .subscribers
                    .find_by_emails(&requested)
                    .await?
                    .into_iter()
                    .map(|subscriber| subscriber.email)
                    .collect();

                let (recipients, not_found): (Vec<_>, Vec<_>) = requested
                    .into_iter()
                    .partition(|email| subscribed.contains(email));

                Ok(ResolvedAudience {
                    recipients,
                    not_found,
                })
            }
        }
    }
}

/// Keeps the first occurrence of every address, in request order.
fn dedup(emails: &[SubscriberEmail]) -> Vec<SubscriberEmail> {
    let mut seen: HashSet<&SubscriberEmail> = HashSet::new();

    emails
        .iter()
        .filter(|email| seen.insert(*email))
        .cloned()
        .collect()
}
