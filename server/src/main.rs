mod config;
mod logging;

use std::process;

use tracing::{error, info};

use api::geocode::Geocoder;
use api::{ApiConfig, AppState};
use database::{initialize_database, DatabaseConfig};
use uploads::{PhotoStore, UploadConfig};
use user::{Mailer, TokenService, UserStore};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Held for the lifetime of the process so buffered log lines flush
    let _guard = match logging::init_logging(&config.data_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Fatal server error: {}", e);
        process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("=== Platter API starting ===");

    let db = initialize_database(
        DatabaseConfig::new().with_database_path(config.data_path.join("platter.db")),
    )
    .await?;

    let state = AppState {
        users: UserStore::new(db.get_pool()),
        tokens: TokenService::new(&config.jwt_secret, config.jwt_expire_days),
        mailer: Mailer::new(config.mailer.clone()),
        photos: PhotoStore::new(UploadConfig::new(
            config.data_path.join("uploads"),
            config.max_file_upload,
        )),
        geocoder: Geocoder::new(config.geocoder.clone()),
        cookie_secure: config.cookie_secure,
        db,
    };

    api::start_server_with_config(state, ApiConfig::new().with_port(config.port)).await
}
