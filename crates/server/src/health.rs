//! Liveness and readiness endpoints, served on their own port so load
//! balancers can probe without touching the API listener.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tracing::{info, warn};

use reqflow_core::config::ServerConfig;
use reqflow_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    pool: DbPool,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub healthy: bool,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: Vec<HealthCheck>,
}

pub fn router(pool: DbPool) -> Router {
    Router::new()
        .route("/health", get(ready))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .with_state(HealthState { pool })
}

/// Binds the health listener and serves it on a background task.
pub async fn spawn(
    config: &ServerConfig,
    pool: DbPool,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let address = format!("{}:{}", config.bind_address, config.health_check_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(event_name = "system.health.started", %address, "health endpoints listening");

    let app = router(pool);
    Ok(tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            warn!(event_name = "system.health.stopped", %error, "health listener exited");
        }
    }))
}

async fn live() -> &'static str {
    "ok"
}

async fn ready(State(state): State<HealthState>) -> Response {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => HealthCheck {
            name: "database",
            healthy: true,
            details: "reachable".to_owned(),
        },
        Err(error) => HealthCheck {
            name: "database",
            healthy: false,
            details: error.to_string(),
        },
    };

    let all_healthy = database.healthy;
    let response = HealthResponse {
        status: if all_healthy { "ready" } else { "degraded" },
        checks: vec![database],
    };
    let code = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(response)).into_response()
}
