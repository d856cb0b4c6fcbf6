use serde::Deserialize;

use crate::domain::new_campaign::CampaignValidationError;
use crate::domain::subscriber_email::SubscriberEmail;

/// Who a campaign is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum AudienceTarget {
    All,
    Explicit(Vec<SubscriberEmail>),
}

impl AudienceTarget {
    pub fn explicit(
        emails: Vec<SubscriberEmail>,
    ) -> Result<AudienceTarget, CampaignValidationError> {
        if emails.is_empty() {
            return Err(CampaignValidationError::InvalidTarget(String::from(
                "target emails cannot be empty",
            )));
        }

        Ok(AudienceTarget::Explicit(emails))
    }
}

/// Raw `target` object as sent by clients: either `{"all": true}` or `{"emails": [...]}`.
#[derive(Deserialize, Debug, Default)]
pub struct TargetBody {
    pub all: Option<bool>,
    pub emails: Option<Vec<String>>,
}

impl TryFrom<TargetBody> for AudienceTarget {
    type Error = CampaignValidationError;

    fn try_from(body: TargetBody) -> Result<Self, Self::Error> {
        let all = body.all.unwrap_or(false);

        match (all, body.emails) {
            (true, Some(_)) => Err(CampaignValidationError::InvalidTarget(String::from(
                "target cannot set both 'all' and 'emails'",
            ))),
            (true, None) => Ok(AudienceTarget::All),
            (false, Some(emails)) => {
                let emails = emails
                    .into_iter()
                    .map(SubscriberEmail::parse)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|reason| CampaignValidationError::InvalidField {
                        field: "target.emails",
                        reason,
                    })?;

                AudienceTarget::explicit(emails)
            }
            (false, None) => Err(CampaignValidationError::InvalidTarget(String::from(
                "target must set 'all' to true or provide 'emails'",
            ))),
        }
    }
}
