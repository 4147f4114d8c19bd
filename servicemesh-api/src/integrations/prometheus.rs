//! Prometheus HTTP API adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::http::{HttpSettings, RequestAuth, UpstreamClient};
use super::{ServiceAdapter, ServiceHealth};
use crate::credentials::{AuthScheme, Credential, ServiceType};
use crate::{Error, Result};

const API_ROOT: &str = "api/v1";

/// Standard response envelope of the Prometheus HTTP API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    error_type: Option<String>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if self.status != "success" {
            let message = self.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(match self.error_type.as_deref() {
                Some("bad_data") => {
                    Error::validation(format!("Prometheus rejected the request: {}", message))
                }
                _ => Error::unavailable(format!("Prometheus returned an error: {}", message)),
            });
        }
        self.data
            .ok_or_else(|| Error::unavailable("Prometheus response is missing data"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BuildInfo {
    pub version: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default, rename = "goVersion")]
    pub go_version: Option<String>,
}

/// Result of an instant or range query.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub state: String,
    #[serde(default, rename = "activeAt")]
    pub active_at: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricMetadata {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub unit: String,
}

/// Client for one Prometheus server.
#[derive(Debug, Clone)]
pub struct PrometheusAdapter {
    client: UpstreamClient,
    build_info: BuildInfo,
}

impl PrometheusAdapter {
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.client
            .json::<Envelope<T>>(request, None)
            .await?
            .into_data()
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build_info
    }

    /// Instant query, evaluated at `time` (RFC 3339 or unix seconds) or now.
    pub async fn query(&self, query: &str, time: Option<&str>) -> Result<QueryData> {
        let query = require_query(query)?;
        let mut request = self.client.get("query").query(&[("query", query)]);
        if let Some(time) = time {
            request = request.query(&[("time", time)]);
        }
        self.fetch(request).await
    }

    pub async fn query_range(
        &self,
        query: &str,
        start: &str,
        end: &str,
        step: &str,
    ) -> Result<QueryData> {
        let query = require_query(query)?;
        let request = self.client.get("query_range").query(&[
            ("query", query),
            ("start", start),
            ("end", end),
            ("step", step),
        ]);
        self.fetch(request).await
    }

    pub async fn alerts(&self) -> Result<Vec<Alert>> {
        let data: AlertsData = self.fetch(self.client.get("alerts")).await?;
        Ok(data.alerts)
    }

    /// Metric names, optionally filtered by a regular expression.
    pub async fn metrics(&self, match_regex: Option<&str>) -> Result<Vec<String>> {
        // Compile first so a bad pattern fails before any upstream call.
        let filter = match match_regex.filter(|p| !p.is_empty()) {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| Error::validation(format!("Invalid metric regex: {}", e)))?,
            ),
            None => None,
        };

        let names: Vec<String> = self
            .fetch(self.client.get("label/__name__/values"))
            .await?;
        Ok(filter_names(names, filter.as_ref()))
    }

    /// Metadata per metric; when a metric has several entries the first wins.
    pub async fn metadata(&self, metric: Option<&str>) -> Result<BTreeMap<String, MetricMetadata>> {
        let mut request = self.client.get("metadata");
        if let Some(metric) = metric.filter(|m| !m.is_empty()) {
            request = request.query(&[("metric", metric)]);
        }
        let raw: BTreeMap<String, Vec<MetricMetadata>> = self.fetch(request).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(name, entries)| entries.into_iter().next().map(|m| (name, m)))
            .collect())
    }
}

fn require_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    Ok(query)
}

fn filter_names(names: Vec<String>, filter: Option<&Regex>) -> Vec<String> {
    match filter {
        Some(re) => names.into_iter().filter(|n| re.is_match(n)).collect(),
        None => names,
    }
}

/// Count `up` samples with value `1` and the total, from a vector result.
fn count_up_targets(result: &serde_json::Value) -> (usize, usize) {
    let samples = result.as_array().map(Vec::as_slice).unwrap_or_default();
    let up = samples
        .iter()
        .filter(|s| s["value"][1].as_str() == Some("1"))
        .count();
    (up, samples.len())
}

#[async_trait]
impl ServiceAdapter for PrometheusAdapter {
    const SERVICE_TYPE: ServiceType = ServiceType::Prometheus;

    async fn connect(credential: &Credential, http: &HttpSettings) -> Result<Self> {
        let auth = match &credential.auth {
            AuthScheme::Basic { username, password } => RequestAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthScheme::ApiKey(token) => RequestAuth::Bearer(token.clone()),
        };
        let client = UpstreamClient::new(credential, API_ROOT, http)?.with_auth(auth);

        let build_info: BuildInfo = client
            .json::<Envelope<BuildInfo>>(client.get("status/buildinfo"), None)
            .await?
            .into_data()?;
        debug!(version = %build_info.version, "Connected to Prometheus");

        Ok(Self { client, build_info })
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let data = self.query("up", None).await?;
        let (up, total) = count_up_targets(&data.result);

        let health = if up < total {
            ServiceHealth::degraded(format!("{} of {} targets down", total - up, total))
        } else {
            ServiceHealth::healthy().with_message(format!("{} targets up", up))
        };
        Ok(health.with_version(self.build_info.version.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let env: Envelope<Vec<String>> =
            serde_json::from_str(r#"{"status":"success","data":["up","go_goroutines"]}"#).unwrap();
        assert_eq!(env.into_data().unwrap(), vec!["up", "go_goroutines"]);
    }

    #[test]
    fn test_envelope_error_mapping() {
        let env: Envelope<QueryData> = serde_json::from_str(
            r#"{"status":"error","errorType":"bad_data","error":"parse error at char 3"}"#,
        )
        .unwrap();
        assert!(matches!(env.into_data(), Err(Error::Validation(_))));

        let env: Envelope<QueryData> = serde_json::from_str(
            r#"{"status":"error","errorType":"timeout","error":"query timed out"}"#,
        )
        .unwrap();
        assert!(matches!(env.into_data(), Err(Error::ServiceUnavailable(_))));
    }

    #[test]
    fn test_count_up_targets() {
        let result = serde_json::json!([
            {"metric": {"job": "node"}, "value": [1700000000.0, "1"]},
            {"metric": {"job": "db"}, "value": [1700000000.0, "0"]},
            {"metric": {"job": "web"}, "value": [1700000000.0, "1"]}
        ]);
        assert_eq!(count_up_targets(&result), (2, 3));
        assert_eq!(count_up_targets(&serde_json::json!([])), (0, 0));
    }

    #[test]
    fn test_filter_names() {
        let names = vec![
            "node_cpu_seconds_total".to_string(),
            "node_memory_bytes".to_string(),
            "up".to_string(),
        ];
        let re = Regex::new("^node_").unwrap();
        assert_eq!(filter_names(names.clone(), Some(&re)).len(), 2);
        assert_eq!(filter_names(names, None).len(), 3);
    }

    #[test]
    fn test_require_query() {
        assert!(matches!(require_query("  "), Err(Error::Validation(_))));
        assert_eq!(require_query(" up ").unwrap(), "up");
    }
}
