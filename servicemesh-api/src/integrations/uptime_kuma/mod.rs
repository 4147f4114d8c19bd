//! Uptime Kuma adapter.
//!
//! Uptime Kuma manages monitors over Socket.IO; its plain HTTP surface is the
//! Prometheus-style `/metrics` endpoint (basic auth) and the public status-page
//! API. Monitor state is therefore read from the metrics exposition.

mod exposition;

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::http::{HttpSettings, RequestAuth, Target, UpstreamClient};
use super::{ServiceAdapter, ServiceHealth};
use crate::credentials::{AuthScheme, Credential, ServiceType};
use crate::{Error, Result};

pub use exposition::Sample;

/// Certificates expiring within this many days are reported in statistics.
pub const CERT_EXPIRY_WARNING_DAYS: i64 = 14;

/// Monitor state as exported by Uptime Kuma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Down,
    Up,
    Pending,
    Maintenance,
    Unknown,
}

impl MonitorStatus {
    fn from_metric(value: f64) -> Self {
        // `as` would saturate NaN to 0 and report the monitor as down.
        if !value.is_finite() || value.fract() != 0.0 {
            return Self::Unknown;
        }
        match value as i64 {
            0 => Self::Down,
            1 => Self::Up,
            2 => Self::Pending,
            3 => Self::Maintenance,
            _ => Self::Unknown,
        }
    }
}

/// A monitor reconstructed from the `monitor_*` metric family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Monitor {
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub url: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub status: MonitorStatus,
    pub response_time_ms: Option<f64>,
    pub cert_valid: Option<bool>,
    pub cert_days_remaining: Option<i64>,
}

impl Monitor {
    fn from_labels(sample: &Sample) -> Option<Self> {
        let name = label(sample, "monitor_name")?;
        Some(Self {
            name,
            monitor_type: label(sample, "monitor_type").unwrap_or_else(|| "unknown".to_string()),
            url: label(sample, "monitor_url"),
            hostname: label(sample, "monitor_hostname"),
            port: label(sample, "monitor_port").and_then(|p| p.parse().ok()),
            status: MonitorStatus::Unknown,
            response_time_ms: None,
            cert_valid: None,
            cert_days_remaining: None,
        })
    }
}

/// Kuma renders absent label values as the literal `null`.
fn label(sample: &Sample, key: &str) -> Option<String> {
    sample
        .label(key)
        .filter(|v| !v.is_empty() && *v != "null")
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CertificateExpiry {
    pub monitor: String,
    pub days_remaining: i64,
}

/// Aggregate view over all monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonitorStatistics {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub pending: usize,
    pub maintenance: usize,
    pub unknown: usize,
    pub average_response_time_ms: Option<f64>,
    /// Certificates expiring within 14 days, soonest first.
    pub expiring_certificates: Vec<CertificateExpiry>,
}

impl MonitorStatistics {
    pub fn from_monitors(monitors: &[Monitor]) -> Self {
        let count = |status: MonitorStatus| monitors.iter().filter(|m| m.status == status).count();

        let response_times: Vec<f64> = monitors
            .iter()
            .filter_map(|m| m.response_time_ms)
            .filter(|t| t.is_finite() && *t >= 0.0)
            .collect();
        let average_response_time_ms = if response_times.is_empty() {
            None
        } else {
            Some(response_times.iter().sum::<f64>() / response_times.len() as f64)
        };

        let mut expiring_certificates: Vec<CertificateExpiry> = monitors
            .iter()
            .filter_map(|m| {
                m.cert_days_remaining
                    .filter(|days| *days <= CERT_EXPIRY_WARNING_DAYS)
                    .map(|days_remaining| CertificateExpiry {
                        monitor: m.name.clone(),
                        days_remaining,
                    })
            })
            .collect();
        expiring_certificates.sort_by_key(|c| c.days_remaining);

        Self {
            total: monitors.len(),
            up: count(MonitorStatus::Up),
            down: count(MonitorStatus::Down),
            pending: count(MonitorStatus::Pending),
            maintenance: count(MonitorStatus::Maintenance),
            unknown: count(MonitorStatus::Unknown),
            average_response_time_ms,
            expiring_certificates,
        }
    }
}

/// Rebuild monitors from parsed samples, preserving first-seen order.
pub fn monitors_from_samples(samples: &[Sample]) -> Vec<Monitor> {
    let mut monitors: Vec<Monitor> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for sample in samples.iter().filter(|s| s.name.starts_with("monitor_")) {
        let Some(name) = label(sample, "monitor_name") else {
            continue;
        };
        let slot = match index.get(&name) {
            Some(&i) => i,
            None => {
                let Some(monitor) = Monitor::from_labels(sample) else {
                    continue;
                };
                monitors.push(monitor);
                index.insert(name, monitors.len() - 1);
                monitors.len() - 1
            }
        };

        let monitor = &mut monitors[slot];
        match sample.name.as_str() {
            "monitor_status" => monitor.status = MonitorStatus::from_metric(sample.value),
            "monitor_response_time" => {
                // Kuma exports -1 when no response time is known.
                if sample.value >= 0.0 {
                    monitor.response_time_ms = Some(sample.value);
                }
            }
            "monitor_cert_is_valid" if !sample.value.is_nan() => {
                monitor.cert_valid = Some(sample.value >= 1.0)
            }
            "monitor_cert_days_remaining" if sample.value.is_finite() => {
                monitor.cert_days_remaining = Some(sample.value as i64)
            }
            _ => {}
        }
    }

    monitors
}

/// Client for one Uptime Kuma instance.
#[derive(Debug, Clone)]
pub struct UptimeKumaAdapter {
    client: UpstreamClient,
}

impl UptimeKumaAdapter {
    async fn scrape(&self) -> Result<Vec<Sample>> {
        let body = self.client.text(self.client.get("metrics"), None).await?;
        Ok(exposition::parse(&body))
    }

    pub async fn monitors(&self) -> Result<Vec<Monitor>> {
        let monitors = monitors_from_samples(&self.scrape().await?);
        debug!(count = monitors.len(), "Fetched Uptime Kuma monitors");
        Ok(monitors)
    }

    pub async fn monitor(&self, name: &str) -> Result<Monitor> {
        self.monitors()
            .await?
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::not_found("Monitor", name))
    }

    pub async fn statistics(&self) -> Result<MonitorStatistics> {
        Ok(MonitorStatistics::from_monitors(&self.monitors().await?))
    }

    /// Public status page configuration, groups and incidents.
    pub async fn status_page(&self, slug: &str) -> Result<serde_json::Value> {
        let request = self.client.request_at(Method::GET, "api/status-page", &[slug])?;
        let page: serde_json::Value = self
            .client
            .json(request, Some(Target::new("Status page", slug)))
            .await?;
        ensure_ok(page, slug)
    }

    /// Heartbeat and uptime lists for the monitors on a status page.
    pub async fn status_page_heartbeats(&self, slug: &str) -> Result<serde_json::Value> {
        let request = self.client.request_at(Method::GET, "api/status-page/heartbeat", &[slug])?;
        let beats: serde_json::Value = self
            .client
            .json(request, Some(Target::new("Status page", slug)))
            .await?;
        ensure_ok(beats, slug)
    }
}

/// Kuma answers some lookups with `{"ok": false, "msg": ...}` instead of a 404.
fn ensure_ok(value: serde_json::Value, slug: &str) -> Result<serde_json::Value> {
    if value.get("ok").and_then(serde_json::Value::as_bool) == Some(false) {
        return Err(Error::not_found("Status page", slug));
    }
    Ok(value)
}

#[async_trait]
impl ServiceAdapter for UptimeKumaAdapter {
    const SERVICE_TYPE: ServiceType = ServiceType::UptimeKuma;

    async fn connect(credential: &Credential, http: &HttpSettings) -> Result<Self> {
        let AuthScheme::Basic { username, password } = &credential.auth else {
            return Err(Error::validation(
                "Uptime Kuma credentials require username and password",
            ));
        };

        let client = UpstreamClient::new(credential, "", http)?.with_auth(RequestAuth::Basic {
            username: username.clone(),
            password: password.clone(),
        });
        let adapter = Self { client };
        adapter.client.send(adapter.client.get("metrics"), None).await?;
        Ok(adapter)
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let samples = self.scrape().await?;
        let monitors = monitors_from_samples(&samples);
        let mut health = ServiceHealth::healthy()
            .with_message(format!("{} monitors exported", monitors.len()));

        if let Some(version) = samples
            .iter()
            .find(|s| s.name == "app_version")
            .and_then(|s| s.label("version"))
        {
            health = health.with_version(version);
        }
        Ok(health)
    }
}
