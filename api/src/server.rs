use crate::{create_router, AppState};
use tokio::task::JoinHandle;
use tracing::info;

/// API server configuration
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl ApiConfig {
    /// Create a new API configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Start the API server with the given configuration
pub async fn start_server_with_config(
    state: AppState,
    config: ApiConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on {}", addr);
    info!(
        "Swagger UI available at http://localhost:{}/docs",
        config.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Start the API server with default configuration
pub async fn start_server(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::default();
    start_server_with_config(state, config).await
}

/// Start the API server in a background task
pub fn spawn_server(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = start_server(state).await {
            tracing::error!("API server error: {}", e);
        }
    })
}

/// Start the API server in a background task with custom configuration
pub fn spawn_server_with_config(state: AppState, config: ApiConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = start_server_with_config(state, config).await {
            tracing::error!("API server error: {}", e);
        }
    })
}
