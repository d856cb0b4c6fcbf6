pub mod audience;
pub mod campaigns;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod email_client;
pub mod error;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod startup;
pub mod store;
pub mod telemetry;
