#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    PendingFuture,
    Due,
    Dispatching,
    Sent,
    Failed,
}

impl CampaignState {
    pub fn is_due(&self) -> bool {
        matches!(self, CampaignState::Due)
    }
}

impl AsRef<str> for CampaignState {
    fn as_ref(&self) -> &str {
        match self {
            CampaignState::PendingFuture => "pending_future",
            CampaignState::Due => "due",
            CampaignState::Dispatching => "dispatching",
            CampaignState::Sent => "sent",
            CampaignState::Failed => "failed",
        }
    }
}
