//! API route modules.
//!
//! Organizes routes by resource type.

pub mod credentials;
pub mod grafana;
pub mod health;
pub mod prometheus;
pub mod proxmox;
pub mod uptime_kuma;

use axum::{Router, middleware};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::middleware::jwt_auth_middleware;
use crate::api::openapi::ApiDoc;
use crate::api::server::AppState;

/// Create the main API router with all routes mounted under `prefix`.
pub fn create_router(state: AppState, prefix: &str) -> Router {
    let mut vendors = Router::new()
        .nest("/uptime-kuma", uptime_kuma::router())
        .nest("/prometheus", prometheus::router())
        .nest("/grafana", grafana::router())
        .nest("/proxmox", proxmox::router());

    if let Some(jwt_service) = state.jwt_service.clone() {
        vendors = vendors.layer(middleware::from_fn_with_state(
            jwt_service,
            jwt_auth_middleware,
        ));
    }

    let prefix = prefix.trim_end_matches('/');
    let api = Router::new()
        .nest("/health", health::router())
        .nest("/credentials", credentials::router())
        .merge(vendors);

    // axum cannot nest at the root path.
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    router
        .merge(
            SwaggerUi::new(format!("{}/docs", prefix))
                .url(format!("{}/openapi.json", prefix), ApiDoc::for_prefix(prefix)),
        )
        .with_state(state)
}
