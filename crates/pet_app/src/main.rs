use pet_app::app::run;
use pet_app::config::AppConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config).await {
        eprintln!("Failed to start pet companion: {err:#}");
    }
}
