//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::models::{LivenessResponse, PingResponse};
use crate::api::server::AppState;
use crate::database;
use crate::integrations::SystemHealth;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ping", get(ping))
        .route("/ready", get(readiness_check))
        .route("/services", get(services_health))
}

/// Liveness check - is the service alive?
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = LivenessResponse)
    )
)]
pub async fn liveness_check(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "health",
    responses(
        (status = 200, description = "Pong", body = PingResponse)
    )
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        message: "pong".to_string(),
    })
}

/// Readiness check - is the database reachable?
/// Returns HTTP 200 when ready, HTTP 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve traffic", body = String),
        (status = 503, description = "Database unreachable", body = String)
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match database::ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}

/// Check every configured upstream service.
#[utoipa::path(
    get,
    path = "/health/services",
    tag = "health",
    responses(
        (status = 200, description = "Aggregate upstream health", body = SystemHealth)
    )
)]
pub async fn services_health(State(state): State<AppState>) -> Json<SystemHealth> {
    Json(state.facade.check_all().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_response_serialization() {
        let response = LivenessResponse {
            status: "alive".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 3600,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("alive"));
        assert!(json.contains("3600"));
    }
}
