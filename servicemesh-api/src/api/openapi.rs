//! OpenAPI documentation configuration.
//!
//! This module configures OpenAPI 3.0 document generation using `utoipa`
//! and serves Swagger UI for interactive API exploration.

use utoipa::OpenApi;
use utoipa::openapi::server::Server;

use crate::api::error::ApiErrorResponse;
use crate::api::models::{
    CreateCredentialRequest, CreateFolderRequest, CredentialResponse, LivenessResponse,
    PingResponse, UpdateCredentialRequest,
};
use crate::credentials::ServiceType;
use crate::integrations::grafana::{
    CreateDashboard, CreateDatasource, Dashboard, DashboardSummary, Datasource, Folder,
};
use crate::integrations::prometheus::{Alert, MetricMetadata, QueryData};
use crate::integrations::proxmox::{ClusterOverview, CreateVm, Node, NodeDetail, Vm, VmTask};
use crate::integrations::uptime_kuma::{
    CertificateExpiry, Monitor, MonitorStatistics, MonitorStatus,
};
use crate::integrations::{HealthStatus, ServiceStatus, SystemHealth};

/// OpenAPI documentation for the servicemesh API.
///
/// This struct aggregates all documented endpoints and schemas.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "servicemesh-api",
        version = "0.1.0",
        description = "Credential store and unified REST facade for Uptime Kuma, Prometheus, Grafana and Proxmox VE.",
        license(name = "MIT OR Apache-2.0")
    ),
    tags(
        (name = "health", description = "Liveness, readiness and upstream health"),
        (name = "credentials", description = "Service credential management"),
        (name = "uptime-kuma", description = "Uptime Kuma monitors and status pages"),
        (name = "prometheus", description = "Prometheus queries, alerts and metadata"),
        (name = "grafana", description = "Grafana dashboards, folders and datasources"),
        (name = "proxmox", description = "Proxmox VE nodes and virtual machines")
    ),
    paths(
        // Health endpoints
        crate::api::routes::health::liveness_check,
        crate::api::routes::health::ping,
        crate::api::routes::health::readiness_check,
        crate::api::routes::health::services_health,
        // Credential endpoints
        crate::api::routes::credentials::list_credentials,
        crate::api::routes::credentials::get_credential,
        crate::api::routes::credentials::list_by_service_type,
        crate::api::routes::credentials::create_credential,
        crate::api::routes::credentials::update_credential,
        crate::api::routes::credentials::delete_credential,
        // Uptime Kuma endpoints
        crate::api::routes::uptime_kuma::list_monitors,
        crate::api::routes::uptime_kuma::monitor_statistics,
        crate::api::routes::uptime_kuma::get_monitor,
        crate::api::routes::uptime_kuma::get_status_page,
        crate::api::routes::uptime_kuma::get_status_page_heartbeats,
        // Prometheus endpoints
        crate::api::routes::prometheus::instant_query,
        crate::api::routes::prometheus::range_query,
        crate::api::routes::prometheus::list_alerts,
        crate::api::routes::prometheus::list_metrics,
        crate::api::routes::prometheus::metric_metadata,
        // Grafana endpoints
        crate::api::routes::grafana::list_dashboards,
        crate::api::routes::grafana::create_dashboard,
        crate::api::routes::grafana::get_dashboard,
        crate::api::routes::grafana::delete_dashboard,
        crate::api::routes::grafana::list_folders,
        crate::api::routes::grafana::create_folder,
        crate::api::routes::grafana::list_datasources,
        crate::api::routes::grafana::create_datasource,
        // Proxmox endpoints
        crate::api::routes::proxmox::list_nodes,
        crate::api::routes::proxmox::get_node,
        crate::api::routes::proxmox::cluster_overview,
        crate::api::routes::proxmox::list_vms,
        crate::api::routes::proxmox::get_vm,
        crate::api::routes::proxmox::create_vm,
        crate::api::routes::proxmox::start_vm,
        crate::api::routes::proxmox::stop_vm,
        crate::api::routes::proxmox::delete_vm,
    ),
    components(
        schemas(
            ApiErrorResponse,
            LivenessResponse,
            PingResponse,
            HealthStatus,
            ServiceStatus,
            SystemHealth,
            ServiceType,
            CreateCredentialRequest,
            UpdateCredentialRequest,
            CredentialResponse,
            Monitor,
            MonitorStatus,
            MonitorStatistics,
            CertificateExpiry,
            QueryData,
            Alert,
            MetricMetadata,
            DashboardSummary,
            Dashboard,
            CreateDashboard,
            Folder,
            CreateFolderRequest,
            Datasource,
            CreateDatasource,
            Node,
            NodeDetail,
            ClusterOverview,
            Vm,
            CreateVm,
            VmTask,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

impl ApiDoc {
    /// The document as served by a router mounted under `prefix`.
    ///
    /// Paths are declared relative to the mount point, so the prefix is
    /// published as the server base path instead.
    pub fn for_prefix(prefix: &str) -> utoipa::openapi::OpenApi {
        let base = match prefix.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        let mut doc = Self::openapi();
        doc.servers = Some(vec![Server::new(base)]);
        doc
    }
}

/// Security scheme addon for Bearer JWT authentication.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
