use chore_tracker::app;
use chore_tracker::config::AppConfig;
use clap::Parser;

/// Main entry point for the chore tracker web application
///
/// Reads the configuration from the command line and environment, sets up
/// logging (`RUST_LOG`, defaulting to `info`) and serves until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::parse();
    app::run(config).await
}
