use unicode_segmentation::UnicodeSegmentation;

/// Subject lines and call-to-action labels are shown in mail clients that truncate early.
pub const MAX_SHORT_TEXT_LENGTH: usize = 256;
pub const MAX_BODY_LENGTH: usize = 100_000;

/// A non-blank piece of campaign copy with a bounded length in graphemes.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CampaignText(String);

impl CampaignText {
    pub fn parse(text: String, max_length: usize) -> Result<CampaignText, String> {
        let is_empty_or_whitespace = text.trim().is_empty();
        let is_too_long = text.graphemes(true).count() > max_length;

        if is_empty_or_whitespace {
            return Err(String::from("text cannot be empty"));
        }

        if is_too_long {
            return Err(format!("text cannot be longer than {} characters", max_length));
        }

        Ok(Self(text))
    }

    pub fn short(text: String) -> Result<CampaignText, String> {
        Self::parse(text, MAX_SHORT_TEXT_LENGTH)
    }

    pub fn body(text: String) -> Result<CampaignText, String> {
        Self::parse(text, MAX_BODY_LENGTH)
    }
}

impl AsRef<str> for CampaignText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
