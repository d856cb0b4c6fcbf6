use newsletter_campaigns::config::get_configuration;
use newsletter_campaigns::startup::Application;
use newsletter_campaigns::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber(
        String::from("newsletter_campaigns"),
        String::from("info"),
        std::io::stdout,
    );

    init_subscriber(subscriber).map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    let config = get_configuration().map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid configuration: {}", err),
        )
    })?;
    let application = Application::build(config).await?;

    application.run_until_stop().await
}
