//! API request and response models (DTOs).
//!
//! This module defines the data transfer objects for all API endpoints.
//! Vendor payloads are returned with the adapter types directly; only the
//! credential and health surfaces need dedicated models.
//!
//! # Model Categories
//!
//! - **Credential**: credential CRUD, with secrets redacted on output
//! - **Vendor queries**: query-string parameters of the proxy endpoints
//! - **Health**: liveness and ping responses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::credentials::{AuthScheme, Credential, CredentialPatch, NewCredential, ServiceType};

/// Placeholder returned instead of stored secrets.
pub const REDACTED: &str = "********";

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default)]`: absent stays `None`, `null` becomes
/// `Some(None)` and a value becomes `Some(Some(v))`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Credential
// ============================================================================

/// Request body for creating a credential.
///
/// # Example
///
/// ```json
/// {
///     "service_type": "uptime_kuma",
///     "endpoint": "http://kuma.local:3001",
///     "username": "admin",
///     "password": "secret"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateCredentialRequest {
    /// Optional id; a UUID is generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    /// One of `uptime_kuma`, `prometheus`, `grafana`, `proxmox`
    pub service_type: String,
    /// Base URL of the service
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Verify the upstream TLS certificate (default: true)
    #[serde(default)]
    pub verify_tls: Option<bool>,
}

impl From<CreateCredentialRequest> for NewCredential {
    fn from(req: CreateCredentialRequest) -> Self {
        Self {
            id: req.id,
            service_type: req.service_type,
            endpoint: req.endpoint,
            username: req.username,
            password: req.password,
            api_key: req.api_key,
            verify_tls: req.verify_tls,
        }
    }
}

/// Request body for a partial credential update.
///
/// Omitted fields are kept, `null` clears a field. The id cannot be changed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCredentialRequest {
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub username: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub password: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub api_key: Option<Option<String>>,
    #[serde(default)]
    pub verify_tls: Option<bool>,
}

impl From<UpdateCredentialRequest> for CredentialPatch {
    fn from(req: UpdateCredentialRequest) -> Self {
        Self {
            service_type: req.service_type,
            endpoint: req.endpoint,
            username: req.username,
            password: req.password,
            api_key: req.api_key,
            verify_tls: req.verify_tls,
        }
    }
}

/// Credential as returned by the API. Secrets are replaced by `********`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CredentialResponse {
    pub id: String,
    pub service_type: ServiceType,
    pub endpoint: String,
    /// `basic` or `api_key`
    pub auth_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub verify_tls: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Credential> for CredentialResponse {
    fn from(credential: Credential) -> Self {
        let auth_type = credential.auth.kind().to_string();
        let (username, password, api_key) = match credential.auth {
            AuthScheme::Basic { username, .. } => (Some(username), Some(REDACTED.to_string()), None),
            AuthScheme::ApiKey(_) => (None, None, Some(REDACTED.to_string())),
        };
        Self {
            id: credential.id,
            service_type: credential.service_type,
            endpoint: credential.endpoint,
            auth_type,
            username,
            password,
            api_key,
            verify_tls: credential.verify_tls,
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

// ============================================================================
// Vendor queries
// ============================================================================

/// Selects the stored credential used for a vendor call.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CredentialQuery {
    /// Credential id; defaults to the most recently updated credential of the service type
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InstantQueryParams {
    /// PromQL expression
    pub query: String,
    /// Evaluation time (RFC 3339 or unix seconds); defaults to now
    pub time: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQueryParams {
    /// PromQL expression
    pub query: String,
    pub start: String,
    pub end: String,
    /// Resolution step, e.g. `15s` or `60`
    pub step: String,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricNamesParams {
    /// Regular expression the metric names must match
    #[serde(alias = "match")]
    pub match_regex: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetadataParams {
    /// Limit the result to one metric
    pub metric: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardListParams {
    /// Only dashboards in this folder
    pub folder_id: Option<i64>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub title: String,
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VmListParams {
    /// Only VMs on this node
    pub node: Option<String>,
    pub credential_id: Option<String>,
}

// ============================================================================
// Health
// ============================================================================

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LivenessResponse {
    /// Always `alive` if responding
    pub status: String,
    pub version: String,
    /// Server uptime in seconds
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateCredentialRequest =
            serde_json::from_str(r#"{"api_key": null, "username": "bob"}"#).unwrap();
        assert_eq!(req.api_key, Some(None));
        assert_eq!(req.username, Some(Some("bob".to_string())));
        assert_eq!(req.password, None);
        assert_eq!(req.endpoint, None);
    }

    #[test]
    fn test_update_request_rejects_id() {
        let result = serde_json::from_str::<UpdateCredentialRequest>(r#"{"id": "other"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let result = serde_json::from_str::<CreateCredentialRequest>(
            r#"{"service_type":"grafana","endpoint":"http://g","token":"x"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_credential_response_redacts_secrets() {
        let credential = Credential {
            id: "kuma".to_string(),
            service_type: ServiceType::UptimeKuma,
            endpoint: "http://kuma.local".to_string(),
            auth: AuthScheme::Basic {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            },
            verify_tls: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let response = CredentialResponse::from(credential);
        assert_eq!(response.auth_type, "basic");
        assert_eq!(response.username.as_deref(), Some("admin"));
        assert_eq!(response.password.as_deref(), Some(REDACTED));
        assert_eq!(response.api_key, None);

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains(r#""service_type":"uptime_kuma""#));
    }

    #[test]
    fn test_metric_names_params_accepts_match_alias() {
        let params: MetricNamesParams = serde_json::from_str(r#"{"match": "^node_"}"#).unwrap();
        assert_eq!(params.match_regex.as_deref(), Some("^node_"));
    }
}
