//! Credential management routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::models::{CreateCredentialRequest, CredentialResponse, UpdateCredentialRequest};
use crate::api::server::AppState;
use crate::credentials::ServiceType;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_credentials).post(create_credential))
        .route(
            "/{id}",
            get(get_credential)
                .patch(update_credential)
                .delete(delete_credential),
        )
        .route("/service/{service_type}", get(list_by_service_type))
}

#[utoipa::path(
    get,
    path = "/credentials",
    tag = "credentials",
    responses(
        (status = 200, description = "All credentials, oldest first", body = Vec<CredentialResponse>)
    )
)]
pub async fn list_credentials(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CredentialResponse>>> {
    let credentials = state.credential_service.list().await?;
    Ok(Json(credentials.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/credentials/{id}",
    tag = "credentials",
    params(
        ("id" = String, Path, description = "Credential id")
    ),
    responses(
        (status = 200, description = "Credential", body = CredentialResponse),
        (status = 404, description = "Credential not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn get_credential(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<CredentialResponse>> {
    let credential = state.credential_service.get(&id).await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    get,
    path = "/credentials/service/{service_type}",
    tag = "credentials",
    params(
        ("service_type" = String, Path, description = "uptime_kuma, prometheus, grafana or proxmox")
    ),
    responses(
        (status = 200, description = "Credentials of the service type, most recently updated first", body = Vec<CredentialResponse>),
        (status = 404, description = "No credentials for the service type", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Unknown service type", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn list_by_service_type(
    State(state): State<AppState>,
    ApiPath(service_type): ApiPath<String>,
) -> ApiResult<Json<Vec<CredentialResponse>>> {
    let service_type = ServiceType::parse(&service_type)?;
    let credentials = state
        .credential_service
        .get_by_service_type(service_type)
        .await?;
    Ok(Json(credentials.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/credentials",
    tag = "credentials",
    request_body = CreateCredentialRequest,
    responses(
        (status = 201, description = "Credential created", body = CredentialResponse),
        (status = 409, description = "Id already exists", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Invalid credential", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn create_credential(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateCredentialRequest>,
) -> ApiResult<(StatusCode, Json<CredentialResponse>)> {
    let credential = state.credential_service.create(request.into()).await?;
    Ok((StatusCode::CREATED, Json(credential.into())))
}

#[utoipa::path(
    patch,
    path = "/credentials/{id}",
    tag = "credentials",
    params(
        ("id" = String, Path, description = "Credential id")
    ),
    request_body = UpdateCredentialRequest,
    responses(
        (status = 200, description = "Credential updated", body = CredentialResponse),
        (status = 404, description = "Credential not found", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Invalid update", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn update_credential(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateCredentialRequest>,
) -> ApiResult<Json<CredentialResponse>> {
    let credential = state
        .credential_service
        .update(&id, request.into())
        .await?;
    Ok(Json(credential.into()))
}

#[utoipa::path(
    delete,
    path = "/credentials/{id}",
    tag = "credentials",
    params(
        ("id" = String, Path, description = "Credential id")
    ),
    responses(
        (status = 204, description = "Credential deleted"),
        (status = 404, description = "Credential not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn delete_credential(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    state.credential_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
