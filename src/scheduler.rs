//! Periodic delivery of due campaigns.
//!
//! Every delivery, whether started by a tick or by the immediate-send path, goes through
//! [`CampaignScheduler::deliver`]:
//!
//! 1. `claim` moves the campaign from Due to Dispatching with a conditional update. Only one
//!    caller can win it, so only one caller ever reaches the transport.
//! 2. The content is rendered and dispatched.
//! 3. Success is recorded with `mark_sent`. A failure is handed back with `release`, which
//!    counts the attempt and dead-letters the campaign once `max_attempts` is reached.
//!
//! A process that dies between 1 and 3 leaves the campaign in Dispatching. Such campaigns are
//! reported as stalled on every tick and never dispatched again.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::delivery::{DispatchResult, Dispatcher};
use crate::domain::campaign::Campaign;
use crate::render::render;
use crate::store::{CampaignStore, ReleaseOutcome, StoreError};

const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub stall_after: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy {
            max_attempts: 5,
            stall_after: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { sent_at: DateTime<Utc> },
    /// Dispatch failed; still due and will be retried.
    Retrying { attempts: u32, reason: String },
    /// Dispatch failed for the last allowed time.
    GaveUp { attempts: u32, reason: String },
    /// Someone else holds or already completed the campaign, or it is not due yet.
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub stalled: usize,
    /// The tick did not run because another one was still in progress.
    pub overlapped: bool,
}

impl TickReport {
    fn overlapped() -> TickReport {
        TickReport {
            overlapped: true,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent { .. } => self.sent += 1,
            DeliveryOutcome::Retrying { .. } => self.retrying += 1,
            DeliveryOutcome::GaveUp { .. } => self.failed += 1,
            DeliveryOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct CampaignScheduler {
    campaigns: Arc<dyn CampaignStore>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    policy: DeliveryPolicy,
    tick_guard: Mutex<()>,
}

impl CampaignScheduler {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        policy: DeliveryPolicy,
    ) -> CampaignScheduler {
        CampaignScheduler {
            campaigns,
            dispatcher,
            clock,
            policy,
            tick_guard: Mutex::new(()),
        }
    }

    /// Runs one scan over the due campaigns. Fails only when the due campaigns cannot be
    /// read; per-campaign errors are logged and counted in the report.
    #[tracing::instrument(name = "Campaign scheduler tick", skip(self))]
    pub async fn tick(&self) -> Result<TickReport, StoreError> {
        let _guard = match self.tick_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Previous scheduler tick is still running, skipping this one");
                return Ok(TickReport::overlapped());
            }
        };

        let now = self.clock.now();
        let due = self.campaigns.find_due(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        for campaign in due.iter() {
            match self.deliver(campaign).await {
                Ok(outcome) => {
                    if let DeliveryOutcome::Sent { .. } = outcome {
                        tracing::info!(campaign_id = %campaign.id, "Sent scheduled campaign");
                    }
                    report.record(&outcome);
                }
                Err(err) => {
                    report.errored += 1;
                    tracing::error!(
                        error.cause_chain = ?err,
                        campaign_id = %campaign.id,
                        "Failed to deliver a due campaign"
                    );
                }
            }
        }

        report.stalled = self.report_stalled(now).await;

        Ok(report)
    }

    /// Claims, renders, dispatches and records one campaign.
    #[tracing::instrument(
        name = "Deliver a campaign",
        skip(self, campaign),
        fields(campaign_id = %campaign.id, recipients = campaign.recipients.len())
    )]
    pub async fn deliver(&self, campaign: &Campaign) -> Result<DeliveryOutcome, StoreError> {
        let claimed_at = self.clock.now();

        if !self.campaigns.claim(campaign.id, claimed_at).await? {
            tracing::debug!("Campaign is not claimable, skipping");
            return Ok(DeliveryOutcome::Skipped);
        }

        let message = render(&campaign.content);
        let result = self
            .dispatcher
            .dispatch(
                &campaign.recipients,
                campaign.content.subject.as_ref(),
                &message,
            )
            .await;

        match result {
            DispatchResult::Success => {
                let sent_at = self.clock.now();

                if self.campaigns.mark_sent(campaign.id, sent_at).await? {
                    Ok(DeliveryOutcome::Sent { sent_at })
                } else {
                    tracing::warn!("Campaign was already marked as sent");
                    Ok(DeliveryOutcome::Skipped)
                }
            }
            DispatchResult::Failure(reason) => {
                let released = self.release_claim(campaign, &reason).await?;

                match released {
                    Some(release) if release.gave_up => {
                        tracing::error!(
                            attempts = release.attempts,
                            reason = %reason,
                            "Giving up on campaign after repeated dispatch failures"
                        );
                        Ok(DeliveryOutcome::GaveUp {
                            attempts: release.attempts,
                            reason,
                        })
                    }
                    Some(release) => {
                        tracing::warn!(
                            attempts = release.attempts,
                            max_attempts = self.policy.max_attempts,
                            reason = %reason,
                            "Campaign dispatch failed, it will be retried on the next tick"
                        );
                        Ok(DeliveryOutcome::Retrying {
                            attempts: release.attempts,
                            reason,
                        })
                    }
                    None => Ok(DeliveryOutcome::Skipped),
                }
            }
        }
    }

    /// The message is known not to have gone out, so the claim must not be left behind.
    /// Transient store errors are retried with a linear backoff.
    async fn release_claim(
        &self,
        campaign: &Campaign,
        reason: &str,
    ) -> Result<Option<ReleaseOutcome>, StoreError> {
        let mut attempt = 1;

        loop {
            let result = self
                .campaigns
                .release(
                    campaign.id,
                    reason,
                    self.policy.max_attempts,
                    self.clock.now(),
                )
                .await;

            match result {
                Err(err) if attempt < RELEASE_ATTEMPTS => {
                    tracing::warn!(
                        error.cause_chain = ?err,
                        attempt,
                        "Failed to release a campaign after a failed dispatch, retrying"
                    );
                    tokio::time::sleep(RELEASE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        error.cause_chain = ?err,
                        "Giving up on releasing the campaign, it stays claimed"
                    );
                    return Err(err);
                }
                Ok(released) => return Ok(released),
            }
        }
    }

    async fn report_stalled(&self, now: DateTime<Utc>) -> usize {
        match self.campaigns.find_stalled(now - self.policy.stall_after).await {
            Ok(stalled) => {
                for campaign in stalled.iter() {
                    tracing::error!(
                        campaign_id = %campaign.id,
                        dispatching_since = ?campaign.dispatching_since,
                        "Campaign has been dispatching for too long and will not be retried"
                    );
                }
                stalled.len()
            }
            Err(err) => {
                tracing::error!(error.cause_chain = ?err, "Failed to look up stalled campaigns");
                0
            }
        }
    }

    /// Spawns the periodic loop. The first tick runs one `period` after start.
    pub fn start(self: Arc<Self>, period: std::time::Duration) -> SchedulerHandle {
        let (shutdown, mut shutdown_signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Campaign scheduler started, ticking every {:?}", period);

            loop {
                tokio::select! {
                    _ = &mut shutdown_signal => break,
                    _ = interval.tick() => {
                        if let Err(err) = self.tick().await {
                            tracing::error!(error.cause_chain = ?err, "Scheduler tick aborted");
                        }
                    }
                }
            }

            tracing::info!("Campaign scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Waits for an in-flight tick to finish, then stops the loop.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());

        if let Err(err) = self.task.await {
            tracing::error!("Campaign scheduler task failed: {:?}", err);
        }
    }
}
