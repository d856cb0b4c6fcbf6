pub mod audience_target;
pub mod campaign;
pub mod campaign_state;
pub mod campaign_text;
pub mod campaign_url;
pub mod contact_message;
pub mod new_campaign;
pub mod new_subscriber;
pub mod subscriber;
pub mod subscriber_email;
