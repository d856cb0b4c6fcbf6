use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::Response;
use serde_json::Value;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsletter_campaigns::{
    clock::MockClock,
    config::{get_configuration, Settings},
    delivery::Dispatcher,
    email_client::EmailClient,
    scheduler::CampaignScheduler,
    startup::Application,
    store::Storage,
    telemetry::{get_subscriber, init_subscriber},
};

// Logs are dropped unless TEST_LOG is set, e.g. `TEST_LOG=true cargo test | bunyan`
static TRACING: Lazy<()> = Lazy::new(|| {
    let name = String::from("test");
    let env_filter = String::from("debug");

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(name, env_filter, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to init the test subscriber.");
    } else {
        let subscriber = get_subscriber(name, env_filter, std::io::sink);
        init_subscriber(subscriber).expect("Failed to init the test subscriber.");
    }
});

pub struct TestApp {
    pub config: Settings,
    pub address: String,
    pub storage: Storage,
    pub clock: Arc<MockClock>,
    pub email_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        Lazy::force(&TRACING);

        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;
        let storage = Storage::in_memory();
        let clock = Arc::new(MockClock::new(Utc::now()));

        // Port 0 lets the OS pick a free port for every test
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        // Tests drive the scheduler by hand through `run_scheduler_tick`
        config.set_scheduler_interval_seconds(3600);

        let application = Application::build_with(config.clone(), storage.clone(), clock.clone())
            .await
            .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        TestApp {
            config,
            address,
            storage,
            clock,
            email_server,
            api_client: reqwest::Client::new(),
        }
    }

    pub async fn mock_email_provider(&self, status: u16) {
        Mock::given(path("/mail/send"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.email_server)
            .await;
    }

    /// Runs one tick of a scheduler sharing the application's storage and clock.
    pub async fn run_scheduler_tick(&self) -> newsletter_campaigns::scheduler::TickReport {
        let email_client = EmailClient::new(
            self.config.get_email_client_base_url(),
            self.config
                .get_email_client_sender()
                .expect("Sender email is not valid"),
            self.config.get_email_client_api(),
            Some(self.config.get_email_client_timeout()),
        )
        .expect("Failed to build the email client.");
        let scheduler = CampaignScheduler::new(
            self.storage.campaigns.clone(),
            Dispatcher::new(Arc::new(email_client)),
            self.clock.clone(),
            self.config.get_delivery_policy(),
        );

        scheduler.tick().await.expect("Scheduler tick failed.")
    }

    pub async fn email_requests(&self) -> Vec<Value> {
        self.email_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).expect("Invalid email body."))
            .collect()
    }

    pub async fn post_subscription(&self, body: &Value) -> Response {
        self.api_client
            .post(format!("{}/subscribe", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn subscribe(&self, email: &str) {
        let response = self
            .post_subscription(&serde_json::json!({ "email": email }))
            .await;

        assert_eq!(201, response.status().as_u16());
    }

    pub async fn get_subscribers(&self) -> Response {
        self.api_client
            .get(format!("{}/subscribers", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_campaign(&self, body: &Value) -> Response {
        self.api_client
            .post(format!("{}/campaigns", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_campaigns(&self) -> Response {
        self.api_client
            .get(format!("{}/campaigns", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_campaign(&self, id: &str) -> Response {
        self.api_client
            .get(format!("{}/campaigns/{}", self.address, id))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_contact(&self, body: &Value) -> Response {
        self.api_client
            .post(format!("{}/contact", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_contacts(&self) -> Response {
        self.api_client
            .get(format!("{}/contact", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// A valid campaign body sent to every subscriber.
pub fn campaign_body() -> Value {
    serde_json::json!({
        "subject": "Spring news",
        "title": "What we shipped",
        "content": "First paragraph\n\nSecond paragraph",
        "ctaText": "Read more",
        "ctaUrl": "https://example.com/news",
        "target": { "all": true }
    })
}
