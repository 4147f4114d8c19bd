//! Uptime Kuma proxy routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiPath, ApiQuery};
use crate::api::models::CredentialQuery;
use crate::api::server::AppState;
use crate::integrations::UptimeKumaAdapter;
use crate::integrations::uptime_kuma::{Monitor, MonitorStatistics};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/monitors", get(list_monitors))
        .route("/monitors/statistics", get(monitor_statistics))
        .route("/monitors/{name}", get(get_monitor))
        .route("/status-pages/{slug}", get(get_status_page))
        .route("/status-pages/{slug}/heartbeats", get(get_status_page_heartbeats))
}

async fn open(state: &AppState, query: &CredentialQuery) -> ApiResult<UptimeKumaAdapter> {
    Ok(state
        .facade
        .open::<UptimeKumaAdapter>(query.credential_id.as_deref())
        .await?)
}

#[utoipa::path(
    get,
    path = "/uptime-kuma/monitors",
    tag = "uptime-kuma",
    params(CredentialQuery),
    responses(
        (status = 200, description = "All monitors", body = Vec<Monitor>),
        (status = 502, description = "Uptime Kuma unreachable", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_monitors(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vec<Monitor>>> {
    let kuma = open(&state, &query).await?;
    Ok(Json(kuma.monitors().await?))
}

#[utoipa::path(
    get,
    path = "/uptime-kuma/monitors/statistics",
    tag = "uptime-kuma",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Monitor counts and certificate warnings", body = MonitorStatistics)
    ),
    security(("bearer_auth" = []))
)]
pub async fn monitor_statistics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<MonitorStatistics>> {
    let kuma = open(&state, &query).await?;
    Ok(Json(kuma.statistics().await?))
}

#[utoipa::path(
    get,
    path = "/uptime-kuma/monitors/{name}",
    tag = "uptime-kuma",
    params(
        ("name" = String, Path, description = "Monitor name"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Monitor", body = Monitor),
        (status = 404, description = "Monitor not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_monitor(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Monitor>> {
    let kuma = open(&state, &query).await?;
    Ok(Json(kuma.monitor(&name).await?))
}

#[utoipa::path(
    get,
    path = "/uptime-kuma/status-pages/{slug}",
    tag = "uptime-kuma",
    params(
        ("slug" = String, Path, description = "Status page slug"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Status page configuration and groups", body = serde_json::Value),
        (status = 404, description = "Status page not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_status_page(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let kuma = open(&state, &query).await?;
    Ok(Json(kuma.status_page(&slug).await?))
}

#[utoipa::path(
    get,
    path = "/uptime-kuma/status-pages/{slug}/heartbeats",
    tag = "uptime-kuma",
    params(
        ("slug" = String, Path, description = "Status page slug"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Heartbeats and uptime per monitor", body = serde_json::Value),
        (status = 404, description = "Status page not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_status_page_heartbeats(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let kuma = open(&state, &query).await?;
    Ok(Json(kuma.status_page_heartbeats(&slug).await?))
}
