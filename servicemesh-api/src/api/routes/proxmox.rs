//! Proxmox VE proxy routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::api::error::ApiResult;
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::models::{CredentialQuery, VmListParams};
use crate::api::server::AppState;
use crate::integrations::ProxmoxAdapter;
use crate::integrations::proxmox::{ClusterOverview, CreateVm, Node, NodeDetail, Vm, VmTask};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/{node}", get(get_node))
        .route("/cluster", get(cluster_overview))
        .route("/vms", get(list_vms))
        .route("/vms/{node}", post(create_vm))
        .route("/vms/{node}/{vmid}", get(get_vm).delete(delete_vm))
        .route("/vms/{node}/{vmid}/start", post(start_vm))
        .route("/vms/{node}/{vmid}/stop", post(stop_vm))
}

async fn open(state: &AppState, credential_id: Option<&str>) -> ApiResult<ProxmoxAdapter> {
    Ok(state.facade.open::<ProxmoxAdapter>(credential_id).await?)
}

#[utoipa::path(
    get,
    path = "/proxmox/nodes",
    tag = "proxmox",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Cluster nodes", body = Vec<Node>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_nodes(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vec<Node>>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.nodes().await?))
}

#[utoipa::path(
    get,
    path = "/proxmox/nodes/{node}",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Node status", body = NodeDetail),
        (status = 404, description = "Node not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_node(
    State(state): State<AppState>,
    ApiPath(node): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<NodeDetail>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.node(&node).await?))
}

#[utoipa::path(
    get,
    path = "/proxmox/cluster",
    tag = "proxmox",
    params(CredentialQuery),
    responses(
        (status = 200, description = "Cluster counts and capacity", body = ClusterOverview)
    ),
    security(("bearer_auth" = []))
)]
pub async fn cluster_overview(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<ClusterOverview>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.cluster_overview().await?))
}

#[utoipa::path(
    get,
    path = "/proxmox/vms",
    tag = "proxmox",
    params(VmListParams),
    responses(
        (status = 200, description = "QEMU guests", body = Vec<Vm>),
        (status = 404, description = "Node not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_vms(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<VmListParams>,
) -> ApiResult<Json<Vec<Vm>>> {
    let proxmox = open(&state, params.credential_id.as_deref()).await?;
    Ok(Json(proxmox.vms(params.node.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/proxmox/vms/{node}/{vmid}",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        ("vmid" = u32, Path, description = "VM id"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "VM", body = Vm),
        (status = 404, description = "VM not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_vm(
    State(state): State<AppState>,
    ApiPath((node, vmid)): ApiPath<(String, u32)>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<Vm>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.vm(&node, vmid).await?))
}

#[utoipa::path(
    post,
    path = "/proxmox/vms/{node}",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        CredentialQuery
    ),
    request_body = CreateVm,
    responses(
        (status = 201, description = "VM creation task started", body = VmTask),
        (status = 404, description = "Node not found", body = crate::api::error::ApiErrorResponse),
        (status = 422, description = "Invalid VM definition", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_vm(
    State(state): State<AppState>,
    ApiPath(node): ApiPath<String>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
    ApiJson(request): ApiJson<CreateVm>,
) -> ApiResult<(StatusCode, Json<VmTask>)> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    let task = proxmox.create_vm(&node, &request).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    post,
    path = "/proxmox/vms/{node}/{vmid}/start",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        ("vmid" = u32, Path, description = "VM id"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Start task", body = VmTask),
        (status = 404, description = "VM not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_vm(
    State(state): State<AppState>,
    ApiPath((node, vmid)): ApiPath<(String, u32)>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<VmTask>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.start_vm(&node, vmid).await?))
}

#[utoipa::path(
    post,
    path = "/proxmox/vms/{node}/{vmid}/stop",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        ("vmid" = u32, Path, description = "VM id"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Stop task", body = VmTask),
        (status = 404, description = "VM not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn stop_vm(
    State(state): State<AppState>,
    ApiPath((node, vmid)): ApiPath<(String, u32)>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<VmTask>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.stop_vm(&node, vmid).await?))
}

#[utoipa::path(
    delete,
    path = "/proxmox/vms/{node}/{vmid}",
    tag = "proxmox",
    params(
        ("node" = String, Path, description = "Node name"),
        ("vmid" = u32, Path, description = "VM id"),
        CredentialQuery
    ),
    responses(
        (status = 200, description = "Delete task", body = VmTask),
        (status = 404, description = "VM not found", body = crate::api::error::ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_vm(
    State(state): State<AppState>,
    ApiPath((node, vmid)): ApiPath<(String, u32)>,
    ApiQuery(query): ApiQuery<CredentialQuery>,
) -> ApiResult<Json<VmTask>> {
    let proxmox = open(&state, query.credential_id.as_deref()).await?;
    Ok(Json(proxmox.delete_vm(&node, vmid).await?))
}
