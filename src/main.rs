use std::process::ExitCode;

use tracing::{error, info};

use filehost::web::AppState;
use filehost::{Config, Database, FileStorage, WebServer};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };

    // Initialize logging
    if let Err(e) = filehost::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        filehost::logging::init_console_only(&config.logging.level);
    }

    // Overrides log rejected values, so they come after logging.
    config.apply_env_overrides();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> filehost::Result<()> {
    config.validate()?;

    let quota = config.storage.quota_policy();
    info!(
        storage = %config.storage.path,
        capacity = quota.capacity_bytes(),
        admission = ?quota.admission(),
        "filehost starting"
    );

    let db = Database::open(&config.database.path).await?;
    let storage = FileStorage::new(&config.storage.path)?;

    let server = WebServer::new(&config.server, AppState::new(db, storage, quota))?;
    server.run().await?;

    Ok(())
}
