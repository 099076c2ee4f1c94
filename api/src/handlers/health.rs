use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;

use crate::{
    error::ApiResult,
    models::{DatabaseHealth, HealthResponse},
    AppState,
};

/// Health check endpoint
///
/// GET /api/v1/health
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health report", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let database = match sqlx::query("SELECT 1").fetch_one(state.db.pool()).await {
        Ok(_) => DatabaseHealth {
            connected: true,
            message: "Database connection successful".to_string(),
        },
        Err(err) => DatabaseHealth {
            connected: false,
            message: format!("Database connection failed: {}", err),
        },
    };

    let response = HealthResponse {
        status: if database.connected {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database,
    };

    Ok(Json(response))
}
