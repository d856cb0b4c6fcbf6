use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, http::StatusCode, web, App, HttpRequest, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::audience::AudienceResolver;
use crate::campaigns::CampaignService;
use crate::clock::{Clock, SystemClock};
use crate::config::{DatabaseSettings, Settings};
use crate::delivery::Dispatcher;
use crate::email_client::EmailClient;
use crate::error::error_response;
use crate::routes::{
    get_campaign, handle_create_campaign, handle_create_contact_message,
    handle_create_subscription, health_check, list_campaigns, list_contact_messages,
    list_subscribers,
};
use crate::scheduler::{CampaignScheduler, SchedulerHandle};
use crate::store::Storage;

pub struct Application {
    port: u16,
    server: Server,
    scheduler: SchedulerHandle,
}

impl Application {
    /// Builds the application against Postgres and the system clock.
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = get_connection_db_pool(&config.database);

        Self::build_with(config, Storage::postgres(db_pool), Arc::new(SystemClock)).await
    }

    pub async fn build_with(
        config: Settings,
        storage: Storage,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, std::io::Error> {
        let sender_email = config
            .get_email_client_sender()
            .map_err(|err| invalid_config(format!("Sender email is not valid: {}", err)))?;
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )
        .map_err(|err| invalid_config(format!("Failed to build the email client: {}", err)))?;

        let scheduler = Arc::new(CampaignScheduler::new(
            storage.campaigns.clone(),
            Dispatcher::new(Arc::new(email_client)),
            clock.clone(),
            config.get_delivery_policy(),
        ));
        let service = CampaignService::new(
            AudienceResolver::new(storage.subscribers.clone()),
            storage.campaigns.clone(),
            scheduler.clone(),
            clock.clone(),
        );

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, storage, service, clock)?;

        tracing::info!("Server listening on {}:{}", config.application.get_host(), port);

        let scheduler = scheduler.start(config.get_scheduler_interval());

        Ok(Self {
            port,
            server,
            scheduler,
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Serves until the HTTP server stops, then shuts the scheduler down.
    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        let result = self.server.await;

        self.scheduler.stop().await;

        result
    }
}

pub fn run(
    listener: TcpListener,
    storage: Storage,
    campaigns: CampaignService,
    clock: Arc<dyn Clock>,
) -> Result<Server, std::io::Error> {
    let subscribers = web::Data::from(storage.subscribers);
    let contacts = web::Data::from(storage.contacts);
    let campaigns = web::Data::new(campaigns);
    let clock = web::Data::from(clock);

    let server = HttpServer::new(move || {
        App::new()
            // Request spans for every incoming request
            .wrap(TracingLogger::default())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health_check", web::get().to(health_check))
            .route("/subscribe", web::post().to(handle_create_subscription))
            .route("/subscribers", web::get().to(list_subscribers))
            .route("/campaigns", web::post().to(handle_create_campaign))
            .route("/campaigns", web::get().to(list_campaigns))
            .route("/campaigns/{id}", web::get().to(get_campaign))
            .route("/contact", web::post().to(handle_create_contact_message))
            .route("/contact", web::get().to(list_contact_messages))
            .app_data(subscribers.clone())
            .app_data(contacts.clone())
            .app_data(campaigns.clone())
            .app_data(clock.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

fn json_error_handler(err: JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    let reason = err.to_string();
    tracing::warn!("Rejected request body: {}", reason);

    actix_web::error::InternalError::from_response(
        err,
        error_response(StatusCode::BAD_REQUEST, &reason),
    )
    .into()
}

fn invalid_config(reason: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, reason)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
