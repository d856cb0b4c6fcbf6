mod campaigns;
mod contact;
mod health_check;
mod helpers;
mod scheduling;
mod subscriptions;
