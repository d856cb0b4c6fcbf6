use actix_web::web;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::audience_target::{AudienceTarget, TargetBody};
use crate::domain::campaign::CampaignContent;
use crate::domain::campaign_text::CampaignText;
use crate::domain::campaign_url::CampaignUrl;

#[derive(Debug, thiserror::Error)]
pub enum CampaignValidationError {
    #[error("{field} is not valid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("{0}")]
    InvalidTarget(String),
}

pub struct NewCampaign {
    pub content: CampaignContent,
    pub target: AudienceTarget,
    pub schedule_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaignBody {
    pub subject: String,
    pub title: String,
    pub content: String,
    pub cta_text: String,
    pub cta_url: String,
    pub image_url: Option<String>,
    pub target: TargetBody,
    pub schedule_at: Option<DateTime<Utc>>,
}

fn field<T>(
    field: &'static str,
    parsed: Result<T, String>,
) -> Result<T, CampaignValidationError> {
    parsed.map_err(|reason| CampaignValidationError::InvalidField { field, reason })
}

impl TryFrom<NewCampaignBody> for NewCampaign {
    type Error = CampaignValidationError;

    fn try_from(body: NewCampaignBody) -> Result<Self, Self::Error> {
        let image_url = match body.image_url {
            // Clients send an empty string when no image was picked
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(field("imageUrl", CampaignUrl::parse(url))?),
            None => None,
        };

        let content = CampaignContent {
            subject: field("subject", CampaignText::short(body.subject))?,
            title: field("title", CampaignText::short(body.title))?,
            body: field("content", CampaignText::body(body.content))?,
            cta_text: field("ctaText", CampaignText::short(body.cta_text))?,
            cta_url: field("ctaUrl", CampaignUrl::parse(body.cta_url))?,
            image_url,
        };
        let target = AudienceTarget::try_from(body.target)?;

        Ok(NewCampaign {
            content,
            target,
            schedule_at: body.schedule_at,
        })
    }
}

impl TryFrom<web::Json<NewCampaignBody>> for NewCampaign {
    type Error = CampaignValidationError;

    fn try_from(body: web::Json<NewCampaignBody>) -> Result<Self, Self::Error> {
        body.into_inner().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::{CampaignValidationError, NewCampaign, NewCampaignBody};
    use crate::domain::audience_target::TargetBody;
    use claim::{assert_none, assert_ok};

    fn valid_body() -> NewCampaignBody {
        NewCampaignBody {
            subject: String::from("October news"),
            title: String::from("What happened this month"),
            content: String::from("First paragraph\n\nSecond paragraph"),
            cta_text: String::from("Read more"),
            cta_url: String::from("https://example.com/news"),
            image_url: None,
            target: TargetBody {
                all: Some(true),
                emails: None,
            },
            schedule_at: None,
        }
    }

    #[test]
    fn valid_body_is_accepted() {
        assert_ok!(NewCampaign::try_from(valid_body()));
    }

    #[test]
    fn blank_image_url_is_treated_as_missing() {
        let mut body = valid_body();
        body.image_url = Some(String::from(" "));

        let campaign = NewCampaign::try_from(body).unwrap();

        assert_none!(campaign.content.image_url);
    }

    #[test]
    fn invalid_fields_are_rejected_with_the_field_name() {
        let test_cases: Vec<(fn(&mut NewCampaignBody), &str)> = vec![
            (|body| body.subject = String::new(), "subject"),
            (|body| body.title = String::from("   "), "title"),
            (|body| body.content = String::new(), "content"),
            (|body| body.cta_text = String::new(), "ctaText"),
            (|body| body.cta_url = String::from("example.com"), "ctaUrl"),
            (
                |body| body.image_url = Some(String::from("ftp://example.com/a.png")),
                "imageUrl",
            ),
        ];

        for (mutate, expected_field) in test_cases {
            let mut body = valid_body();
            mutate(&mut body);

            match NewCampaign::try_from(body) {
                Err(CampaignValidationError::InvalidField { field, .. }) => {
                    assert_eq!(field, expected_field)
                }
                Err(other) => panic!("Unexpected error {:?} for {}", other, expected_field),
                Ok(_) => panic!("Body with invalid {} was accepted", expected_field),
            }
        }
    }
}
