mod campaigns;
mod contact;
mod health_check;
mod subscriptions;

pub use campaigns::{get_campaign, handle_create_campaign, list_campaigns};
pub use contact::{handle_create_contact_message, list_contact_messages};
pub use health_check::health_check;
pub use subscriptions::{handle_create_subscription, list_subscribers};
