//! Grafana HTTP API adapter.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::http::{HttpSettings, RequestAuth, Target, UpstreamClient};
use super::{ServiceAdapter, ServiceHealth};
use crate::credentials::{AuthScheme, Credential, ServiceType};
use crate::{Error, Result};

const API_ROOT: &str = "api";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Dashboard entry returned by the search API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub id: i64,
    pub uid: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    #[serde(default)]
    pub folder_uid: Option<String>,
    #[serde(default)]
    pub folder_title: Option<String>,
}

/// Full dashboard model plus Grafana's `meta` block.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    #[schema(value_type = Object)]
    pub dashboard: serde_json::Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDashboard {
    /// Dashboard JSON model; must contain a `title`.
    #[schema(value_type = Object)]
    pub dashboard: serde_json::Value,
    #[serde(default)]
    pub folder_uid: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveDashboardResponse {
    uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Folder {
    pub id: i64,
    pub uid: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub id: i64,
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub datasource_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDatasource {
    pub name: String,
    /// Plugin id, e.g. `prometheus`.
    #[serde(rename = "type")]
    pub datasource_type: String,
    pub url: String,
    #[serde(default = "default_access")]
    pub access: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub json_data: Option<serde_json::Value>,
}

fn default_access() -> String {
    "proxy".to_string()
}

#[derive(Debug, Deserialize)]
struct CreateDatasourceResponse {
    datasource: Datasource,
}

/// Client for one Grafana instance.
#[derive(Debug, Clone)]
pub struct GrafanaAdapter {
    client: UpstreamClient,
    organization: Organization,
}

impl GrafanaAdapter {
    pub fn organization(&self) -> &Organization {
        &self.organization
    }

    pub async fn dashboards(&self, folder_id: Option<i64>) -> Result<Vec<DashboardSummary>> {
        let mut request = self.client.get("search").query(&[("type", "dash-db")]);
        if let Some(folder_id) = folder_id {
            request = request.query(&[("folderIds", folder_id)]);
        }
        self.client.json(request, None).await
    }

    pub async fn dashboard(&self, uid: &str) -> Result<Dashboard> {
        let request = self.client.request_at(Method::GET, "dashboards/uid", &[uid])?;
        self.client
            .json(request, Some(Target::new("Dashboard", uid)))
            .await
    }

    /// Save a dashboard and return it as stored.
    pub async fn create_dashboard(&self, req: &CreateDashboard) -> Result<Dashboard> {
        let title = req
            .dashboard
            .get("title")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() {
            return Err(Error::validation("dashboard.title is required"));
        }

        let mut body = json!({
            "dashboard": req.dashboard,
            "overwrite": req.overwrite,
        });
        if let Some(folder_uid) = &req.folder_uid {
            body["folderUid"] = json!(folder_uid);
        }
        if let Some(message) = &req.message {
            body["message"] = json!(message);
        }

        let saved: SaveDashboardResponse = self
            .client
            .json(
                self.client.request(Method::POST, "dashboards/db").json(&body),
                None,
            )
            .await?;
        info!(uid = %saved.uid, title = %title, "Saved Grafana dashboard");

        self.dashboard(&saved.uid).await
    }

    pub async fn delete_dashboard(&self, uid: &str) -> Result<()> {
        let request = self.client.request_at(Method::DELETE, "dashboards/uid", &[uid])?;
        self.client
            .send(request, Some(Target::new("Dashboard", uid)))
            .await?;
        info!(uid = %uid, "Deleted Grafana dashboard");
        Ok(())
    }

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        self.client.json(self.client.get("folders"), None).await
    }

    pub async fn create_folder(&self, title: &str, uid: Option<&str>) -> Result<Folder> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("folder title must not be empty"));
        }
        let mut body = json!({ "title": title });
        if let Some(uid) = uid {
            body["uid"] = json!(uid);
        }
        self.client
            .json(self.client.request(Method::POST, "folders").json(&body), None)
            .await
    }

    pub async fn datasources(&self) -> Result<Vec<Datasource>> {
        self.client.json(self.client.get("datasources"), None).await
    }

    pub async fn create_datasource(&self, req: &CreateDatasource) -> Result<Datasource> {
        if req.name.trim().is_empty() {
            return Err(Error::validation("datasource name must not be empty"));
        }
        let mut body = json!({
            "name": req.name,
            "type": req.datasource_type,
            "url": req.url,
            "access": req.access,
            "isDefault": req.is_default,
        });
        if let Some(json_data) = &req.json_data {
            body["jsonData"] = json_data.clone();
        }

        let created: CreateDatasourceResponse = self
            .client
            .json(
                self.client.request(Method::POST, "datasources").json(&body),
                None,
            )
            .await?;
        Ok(created.datasource)
    }
}

#[async_trait]
impl ServiceAdapter for GrafanaAdapter {
    const SERVICE_TYPE: ServiceType = ServiceType::Grafana;

    async fn connect(credential: &Credential, http: &HttpSettings) -> Result<Self> {
        let auth = match &credential.auth {
            AuthScheme::ApiKey(key) => RequestAuth::Bearer(key.clone()),
            AuthScheme::Basic { username, password } => RequestAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
        };
        let client = UpstreamClient::new(credential, API_ROOT, http)?.with_auth(auth);

        let organization: Organization = client.json(client.get("org"), None).await?;
        debug!(org = %organization.name, "Connected to Grafana");

        Ok(Self {
            client,
            organization,
        })
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let response: HealthResponse = self.client.json(self.client.get("health"), None).await?;
        Ok(health_from_response(response))
    }
}

fn health_from_response(response: HealthResponse) -> ServiceHealth {
    let mut health = match response.database.as_deref() {
        Some("ok") | None => ServiceHealth::healthy(),
        Some(state) => ServiceHealth::degraded(format!("database: {}", state)),
    };
    if let Some(version) = response.version {
        health = health.with_version(version);
    }
    health
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::HealthStatus;

    #[test]
    fn test_health_from_response() {
        let ok: HealthResponse =
            serde_json::from_str(r#"{"commit":"abc","database":"ok","version":"11.2.0"}"#)
                .unwrap();
        let health = health_from_response(ok);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.version.as_deref(), Some("11.2.0"));

        let failing: HealthResponse =
            serde_json::from_str(r#"{"database":"failing","version":"11.2.0"}"#).unwrap();
        assert_eq!(health_from_response(failing).status, HealthStatus::Degraded);
    }

    #[test]
    fn test_search_result_decoding() {
        let body = r#"[{"id":1,"uid":"abc","title":"Nodes","uri":"db/nodes","url":"/d/abc/nodes","type":"dash-db","tags":["infra"],"isStarred":false,"folderId":3,"folderUid":"f1","folderTitle":"Infra"}]"#;
        let dashboards: Vec<DashboardSummary> = serde_json::from_str(body).unwrap();
        assert_eq!(dashboards[0].uid, "abc");
        assert_eq!(dashboards[0].folder_id, Some(3));
        assert_eq!(dashboards[0].tags, vec!["infra"]);
    }

    #[test]
    fn test_create_datasource_defaults() {
        let req: CreateDatasource = serde_json::from_str(
            r#"{"name":"prom","type":"prometheus","url":"http://prometheus:9090"}"#,
        )
        .unwrap();
        assert_eq!(req.access, "proxy");
        assert!(!req.is_default);
    }
}
