use validator::validate_url;

/// An absolute http(s) URL used for links and images inside a campaign.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CampaignUrl(String);

impl CampaignUrl {
    pub fn parse(url: String) -> Result<CampaignUrl, String> {
        let url = url.trim().to_string();
        let has_web_scheme = url.starts_with("http://") || url.starts_with("https://");

        if !has_web_scheme || !validate_url(url.as_str()) {
            return Err(format!("{} is not a valid http(s) url", url));
        }

        Ok(Self(url))
    }
}

impl AsRef<str> for CampaignUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
