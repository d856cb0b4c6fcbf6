use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::domain::campaign::{Campaign, CampaignContent};
use crate::domain::campaign_text::CampaignText;
use crate::domain::campaign_url::CampaignUrl;
use crate::domain::contact_message::ContactMessage;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::store::{
    CampaignStore, ContactStore, ReleaseOutcome, StoreError, SubscriberStore,
};

const UNIQUE_VIOLATION: &str = "23505";

const CAMPAIGN_COLUMNS: &str = r#"
    id, recipients, subject, title, content, cta_text, cta_url, image_url,
    schedule_at, created_at, sent, sent_at, dispatching_since, attempts,
    last_error, failed_at
"#;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let is_unique_violation = matches!(
            &err,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
        );

        if is_unique_violation {
            StoreError::Duplicate
        } else {
            StoreError::Database(err)
        }
    }
}

fn corrupted(field: &str, reason: String) -> StoreError {
    StoreError::Corrupted(format!("{}: {}", field, reason))
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, StoreError> {
    Ok(Subscriber {
        email: SubscriberEmail::parse(row.try_get("email")?)
            .map_err(|err| corrupted("email", err))?,
        subscribed_at: row.try_get("subscribed_at")?,
    })
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, StoreError> {
    let recipients = row
        .try_get::<Vec<String>, _>("recipients")?
        .into_iter()
        .map(SubscriberEmail::parse)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| corrupted("recipients", err))?;
    let image_url = row
        .try_get::<Option<String>, _>("image_url")?
        .map(CampaignUrl::parse)
        .transpose()
        .map_err(|err| corrupted("image_url", err))?;
    let attempts: i32 = row.try_get("attempts")?;

    let content = CampaignContent {
        subject: CampaignText::short(row.try_get("subject")?)
            .map_err(|err| corrupted("subject", err))?,
        title: CampaignText::short(row.try_get("title")?)
            .map_err(|err| corrupted("title", err))?,
        body: CampaignText::body(row.try_get("content")?)
            .map_err(|err| corrupted("content", err))?,
        cta_text: CampaignText::short(row.try_get("cta_text")?)
            .map_err(|err| corrupted("cta_text", err))?,
        cta_url: CampaignUrl::parse(row.try_get("cta_url")?)
            .map_err(|err| corrupted("cta_url", err))?,
        image_url,
    };

    Ok(Campaign {
        id: row.try_get("id")?,
        recipients,
        content,
        schedule_at: row.try_get("schedule_at")?,
        created_at: row.try_get("created_at")?,
        sent: row.try_get("sent")?,
        sent_at: row.try_get("sent_at")?,
        dispatching_since: row.try_get("dispatching_since")?,
        attempts: u32::try_from(attempts).map_err(|err| corrupted("attempts", err.to_string()))?,
        last_error: row.try_get("last_error")?,
        failed_at: row.try_get("failed_at")?,
    })
}

fn contact_message_from_row(row: &PgRow) -> Result<ContactMessage, StoreError> {
    Ok(ContactMessage {
        id: row.try_get("id")?,
        name: CampaignText::short(row.try_get("name")?).map_err(|err| corrupted("name", err))?,
        email: SubscriberEmail::parse(row.try_get("email")?)
            .map_err(|err| corrupted("email", err))?,
        phone: CampaignText::short(row.try_get("phone")?).map_err(|err| corrupted("phone", err))?,
        message: CampaignText::body(row.try_get("message")?)
            .map_err(|err| corrupted("message", err))?,
        created_at: row.try_get("created_at")?,
    })
}

fn collect_rows<T>(
    rows: Vec<PgRow>,
    from_row: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(from_row).collect()
}

pub struct PgSubscriberStore {
    db_pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(db_pool: PgPool) -> PgSubscriberStore {
        PgSubscriberStore { db_pool }
    }
}

#[async_trait::async_trait]
impl SubscriberStore for PgSubscriberStore {
    #[tracing::instrument(
        name = "Insert a new subscriber into the database",
        skip(self, subscriber)
    )]
    async fn insert(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (email, subscribed_at)
            VALUES ($1, $2)
            "#,
        )
        .bind(subscriber.email.as_ref())
        .bind(subscriber.subscribed_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetch every subscriber", skip(self))]
    async fn all(&self) -> Result<Vec<Subscriber>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT email, subscribed_at
            FROM subscribers
            ORDER BY subscribed_at ASC, email ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, subscriber_from_row)
    }

    #[tracing::instrument(name = "Fetch subscribers by email", skip(self, emails))]
    async fn find_by_emails(
        &self,
        emails: &[SubscriberEmail],
    ) -> Result<Vec<Subscriber>, StoreError> {
        let emails: Vec<String> = emails.iter().map(|email| email.to_string()).collect();
        let rows = sqlx::query(
            r#"
            SELECT email, subscribed_at
            FROM subscribers
            WHERE email = ANY($1)
            "#,
        )
        .bind(emails)
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, subscriber_from_row)
    }
}

pub struct PgCampaignStore {
    db_pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(db_pool: PgPool) -> PgCampaignStore {
        PgCampaignStore { db_pool }
    }
}

#[async_trait::async_trait]
impl CampaignStore for PgCampaignStore {
    #[tracing::instrument(
        name = "Insert a new campaign into the database",
        skip(self, campaign),
        fields(campaign_id = %campaign.id)
    )]
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let recipients: Vec<String> = campaign
            .recipients
            .iter()
            .map(|email| email.to_string())
            .collect();
        let attempts = i32::try_from(campaign.attempts)
            .map_err(|err| StoreError::InvalidInput(format!("attempts: {}", err)))?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, recipients, subject, title, content, cta_text, cta_url, image_url,
                schedule_at, created_at, sent, sent_at, dispatching_since, attempts,
                last_error, failed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(campaign.id)
        .bind(recipients)
        .bind(campaign.content.subject.as_ref())
        .bind(campaign.content.title.as_ref())
        .bind(campaign.content.body.as_ref())
        .bind(campaign.content.cta_text.as_ref())
        .bind(campaign.content.cta_url.as_ref())
        .bind(campaign.content.image_url.as_ref().map(|url| url.as_ref()))
        .bind(campaign.schedule_at)
        .bind(campaign.created_at)
        .bind(campaign.sent)
        .bind(campaign.sent_at)
        .bind(campaign.dispatching_since)
        .bind(attempts)
        .bind(campaign.last_error.as_deref())
        .bind(campaign.failed_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetch a campaign by id", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.as_ref().map(campaign_from_row).transpose()
    }

    #[tracing::instrument(name = "Fetch every campaign", skip(self))]
    async fn list(&self) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM campaigns ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        ))
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, campaign_from_row)
    }

    #[tracing::instrument(name = "Fetch due campaigns", skip(self))]
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE sent = false
              AND failed_at IS NULL
              AND dispatching_since IS NULL
              AND (schedule_at IS NULL OR schedule_at <= $1)
            ORDER BY COALESCE(schedule_at, created_at) ASC
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, campaign_from_row)
    }

    #[tracing::instrument(name = "Fetch stalled campaigns", skip(self))]
    async fn find_stalled(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE sent = false AND dispatching_since < $1
            ORDER BY dispatching_since ASC
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(claimed_before)
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, campaign_from_row)
    }

    #[tracing::instrument(name = "Claim a campaign for dispatch", skip(self))]
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET dispatching_since = $2
            WHERE id = $1
              AND sent = false
              AND failed_at IS NULL
              AND dispatching_since IS NULL
              AND (schedule_at IS NULL OR schedule_at <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Mark a campaign as sent", skip(self))]
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET sent = true, sent_at = $2, dispatching_since = NULL
            WHERE id = $1 AND sent = false
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "Release a campaign after a failed dispatch", skip(self))]
    async fn release(
        &self,
        id: Uuid,
        reason: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<ReleaseOutcome>, StoreError> {
        let max_attempts = i32::try_from(max_attempts)
            .map_err(|_| StoreError::InvalidInput(format!("max_attempts {}", max_attempts)))?;
        let row = sqlx::query(
            r#"
            UPDATE campaigns
            SET dispatching_since = NULL,
                attempts = attempts + 1,
                last_error = $2,
                failed_at = CASE WHEN attempts + 1 >= $3 THEN $4 ELSE NULL END
            WHERE id = $1 AND sent = false
            RETURNING attempts, failed_at
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(max_attempts)
        .bind(now)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => {
                let attempts: i32 = row.try_get("attempts")?;
                let failed_at: Option<DateTime<Utc>> = row.try_get("failed_at")?;

                Ok(Some(ReleaseOutcome {
                    attempts: u32::try_from(attempts)
                        .map_err(|err| corrupted("attempts", err.to_string()))?,
                    gave_up: failed_at.is_some(),
                }))
            }
            None => Ok(None),
        }
    }
}

pub struct PgContactStore {
    db_pool: PgPool,
}

impl PgContactStore {
    pub fn new(db_pool: PgPool) -> PgContactStore {
        PgContactStore { db_pool }
    }
}

#[async_trait::async_trait]
impl ContactStore for PgContactStore {
    #[tracing::instrument(name = "Insert a contact message into the database", skip(self, message))]
    async fn insert(&self, message: &ContactMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO contact_messages (id, name, email, phone, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.name.as_ref())
        .bind(message.email.as_ref())
        .bind(message.phone.as_ref())
        .bind(message.message.as_ref())
        .bind(message.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetch every contact message", skip(self))]
    async fn list(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, phone, message, created_at
            FROM contact_messages
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        collect_rows(rows, contact_message_from_row)
    }
}
