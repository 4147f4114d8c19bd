//! Prometheus proxy routes.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::extract::ApiQuery;
use crate::api::models::{
    CredentialQuery, InstantQueryParams, MetadataParams, MetricNamesParams, RangeQueryParams,
};
use crate::api::server::AppState;
use crate::integrations::PrometheusAdapter;
use crate::integrations::prometheus::{Alert, MetricMetadata, QueryData};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/query", get(instant_query))
        .route("/query_range", get(range_query))
        .route("/alerts", get(list_alerts))
        .route("/metrics", get(list_metrics))
        .route("/metadata", get(metric_metadata))
}

async fn open(state: &AppState, credential_id: Option<&str>) -> ApiResult<PrometheusAdapter> {
    Ok(state.facade.open::<PrometheusAdapter>(credential_id).await?)
}

#[utoipa::path(
    get,
    path = "/prometheus/query",
    tag = "prometheus",
    params(InstantQueryParams),
    responses(
        (status = 200, description = "Query result", body = QueryData),
        (status = 422, description = "Invalid query", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn instant_query(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<InstantQueryParams>,
) -> ApiResult<Json<QueryData>> {
    let prometheus = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(
        prometheus
            .query(&params.query, params.time.as_deref())
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/prometheus/query_range",
    tag = "prometheus",
    params(RangeQueryParams),
    responses(
        (status = 200, description = "Range query result", body = QueryData),
        (status = 422, description = "Invalid query", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn range_query(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RangeQueryParams>,
) -> ApiResult<Json<QueryData>> {
    let prometheus = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(
        prometheus
            .query_range(&params.query, &params.start, &params.end, &params.step)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/prometheus/alerts",
    tag = "prometheus",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Active alerts", body = Vec<Alert>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let prometheus = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(prometheus.alerts().await?))
}

#[utoipa::path(
    get,
    path = "/prometheus/metrics",
    tag = "prometheus",
    params(MetricNamesParams),
    responses(
        (status = 200, description = "Metric names", body = Vec<String>),
        (status = 422, description = "Invalid regex", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_metrics(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MetricNamesParams>,
) -> ApiResult<Json<Vec<String>>> {
    let prometheus = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(prometheus.metrics(params.match_regex.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/prometheus/metadata",
    tag = "prometheus",
    params(MetadataParams),
    responses(
        (status = 200, description = "Type, help and unit per metric", body = BTreeMap<String, MetricMetadata>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn metric_metadata(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MetadataParams>,
) -> ApiResult<Json<BTreeMap<String, MetricMetadata>>> {
    let prometheus = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(prometheus.metadata(params.metric.as_deref()).await?))
}
