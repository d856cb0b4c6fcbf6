use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use uuid::Uuid;

use crate::campaigns::{CampaignService, CreateCampaignError};
use crate::clock::Clock;
use crate::domain::campaign::Campaign;
use crate::domain::campaign_state::CampaignState;
use crate::domain::new_campaign::{CampaignValidationError, NewCampaign, NewCampaignBody};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::error::{error_chain_fmt, error_response};
use crate::store::StoreError;

#[derive(thiserror::Error)]
pub enum CampaignApiError {
    #[error(transparent)]
    Validation(#[from] CampaignValidationError),
    #[error(transparent)]
    Create(#[from] CreateCampaignError),
    #[error("Failed to read campaigns.")]
    Store(#[from] StoreError),
    #[error("Campaign not found.")]
    NotFound,
}

impl std::fmt::Debug for CampaignApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct NoRecipientsBody<'a> {
    error: &'a str,
    not_found: &'a [SubscriberEmail],
}

impl ResponseError for CampaignApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            CampaignApiError::Validation(_) => StatusCode::BAD_REQUEST,
            CampaignApiError::Create(CreateCampaignError::InvalidTarget) => StatusCode::BAD_REQUEST,
            CampaignApiError::Create(CreateCampaignError::NoRecipients { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CampaignApiError::Create(
                CreateCampaignError::Store(_) | CreateCampaignError::DeliveryTask(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            CampaignApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CampaignApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if let CampaignApiError::Create(CreateCampaignError::NoRecipients { not_found }) = self {
            return HttpResponse::build(status).json(NoRecipientsBody {
                error: &self.to_string(),
                not_found,
            });
        }

        if status.is_server_error() {
            return error_response(status, "Internal server error");
        }

        error_response(status, &self.to_string())
    }
}

/// A stored campaign plus the state derived from it at read time.
#[derive(serde::Serialize)]
struct CampaignResponse<'a> {
    #[serde(flatten)]
    campaign: &'a Campaign,
    state: CampaignState,
}

#[tracing::instrument(
    name = "Create a new campaign handler",
    skip(body, campaigns),
    fields(subject = %body.subject)
)]
pub async fn handle_create_campaign(
    body: web::Json<NewCampaignBody>,
    campaigns: web::Data<CampaignService>,
) -> Result<HttpResponse, CampaignApiError> {
    let new_campaign: NewCampaign = body.try_into().map_err(|err| {
        tracing::warn!("Validation error: {}", err);
        CampaignApiError::Validation(err)
    })?;

    let receipt = campaigns.create(new_campaign).await.map_err(|err| {
        match &err {
            CreateCampaignError::Store(_) | CreateCampaignError::DeliveryTask(_) => {
                tracing::error!(error.cause_chain = ?err, "Failed to create a campaign")
            }
            _ => tracing::warn!("Campaign rejected: {}", err),
        }
        CampaignApiError::Create(err)
    })?;

    Ok(HttpResponse::Created().json(receipt))
}

#[tracing::instrument(name = "List campaigns handler", skip(campaigns, clock))]
pub async fn list_campaigns(
    campaigns: web::Data<CampaignService>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, CampaignApiError> {
    let now = clock.now();
    let stored = campaigns.list().await.map_err(|err| {
        tracing::error!(error.cause_chain = ?err, "Failed to list campaigns");
        CampaignApiError::Store(err)
    })?;
    let response: Vec<CampaignResponse> = stored
        .iter()
        .map(|campaign| CampaignResponse {
            campaign,
            state: campaign.state(now),
        })
        .collect();

    Ok(HttpResponse::Ok().json(response))
}

#[tracing::instrument(name = "Get a campaign handler", skip(campaigns, clock))]
pub async fn get_campaign(
    id: web::Path<Uuid>,
    campaigns: web::Data<CampaignService>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, CampaignApiError> {
    let campaign = campaigns
        .find(id.into_inner())
        .await
        .map_err(|err| {
            tracing::error!(error.cause_chain = ?err, "Failed to read a campaign");
            CampaignApiError::Store(err)
        })?
        .ok_or(CampaignApiError::NotFound)?;

    Ok(HttpResponse::Ok().json(CampaignResponse {
        state: campaign.state(clock.now()),
        campaign: &campaign,
    }))
}
