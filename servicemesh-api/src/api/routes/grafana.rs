//! Grafana proxy routes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::models::{CreateFolderRequest, CredentialQuery, DashboardListParams};
use crate::api::server::AppState;
use crate::integrations::GrafanaAdapter;
use crate::integrations::grafana::{
    CreateDashboard, CreateDatasource, Dashboard, DashboardSummary, Datasource, Folder,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboards", get(list_dashboards).post(create_dashboard))
        .route("/dashboards/{uid}", get(get_dashboard).delete(delete_dashboard))
        .route("/folders", get(list_folders).post(create_folder))
        .route("/datasources", get(list_datasources).post(create_datasource))
}

async fn open(state: &AppState, credential_id: Option<&str>) -> ApiResult<GrafanaAdapter> {
    Ok(state.facade.open::<GrafanaAdapter>(credential_id).await?)
}

#[utoipa::path(
    get,
    path = "/grafana/dashboards",
    tag = "grafana",
    params(DashboardListParams),
    responses(
        (status = 200, description = "Dashboards", body = Vec<DashboardSummary>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_dashboards(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DashboardListParams>,
) -> ApiResult<Json<Vec<DashboardSummary>>> {
    let grafana = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(grafana.dashboards(params.folder_id).await?))
}

#[utoipa::path(
    post,
    path = "/grafana/dashboards",
    tag = "grafana",
    params(CredentialQuery),
    request_body = CreateDashboard,
    responses(
        (status = 201, description = "Dashboard saved", body = Dashboard),
        (status = 422, description = "Invalid dashboard", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_dashboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
    ApiJson(request): ApiJson<CreateDashboard>,
) -> ApiResult<(StatusCode, Json<Dashboard>)> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    let dashboard = grafana.create_dashboard(&request).await?;
    Ok((StatusCode::CREATED, Json(dashboard)))
}

#[utoipa::path(
    get,
    path = "/grafana/dashboards/{uid}",
    tag = "grafana",
    params(
        ("uid" = String, Path, description = "Dashboard uid"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Dashboard", body = Dashboard),
        (status = 404, description = "Dashboard not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    ApiPath(uid): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Dashboard>> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(grafana.dashboard(&uid).await?))
}

#[utoipa::path(
    delete,
    path = "/grafana/dashboards/{uid}",
    tag = "grafana",
    params(
        ("uid" = String, Path, description = "Dashboard uid"),
        CredentialQuery
    ),
    responses(
        (status = 204, description = "Dashboard deleted"),
        (status = 404, description = "Dashboard not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_dashboard(
    State(state): State<AppState>,
    ApiPath(uid): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<StatusCode> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    grafana.delete_dashboard(&uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/grafana/folders",
    tag = "grafana",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Folders", body = Vec<Folder>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_folders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vec<Folder>>> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(grafana.folders().await?))
}

#[utoipa::path(
    post,
    path = "/grafana/folders",
    tag = "grafana",
    params(CredentialQuery),
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created", body = Folder),
        (status = 409, description = "Folder already exists", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_folder(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
    ApiJson(request): ApiJson<CreateFolderRequest>,
) -> ApiResult<(StatusCode, Json<Folder>)> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    let folder = grafana
        .create_folder(&request.title, request.uid.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

#[utoipa::path(
    get,
    path = "/grafana/datasources",
    tag = "grafana",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Datasources", body = Vec<Datasource>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_datasources(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vec<Datasource>>> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(grafana.datasources().await?))
}

#[utoipa::path(
    post,
    path = "/grafana/datasources",
    tag = "grafana",
    params(CredentialQuery),
    request_body = CreateDatasource,
    responses(
        (status = 201, description = "Datasource created", body = Datasource),
        (status = 409, description = "Datasource name taken", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_datasource(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
    ApiJson(request): ApiJson<CreateDatasource>,
) -> ApiResult<(StatusCode, Json<Datasource>)> {
    let grafana = open(&state, query.credential_id.as_deref()).await?;
    let datasource = grafana.create_datasource(&request).await?;
    Ok((StatusCode::CREATED, Json(datasource)))
}
