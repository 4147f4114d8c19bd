//! Health reporting types for upstream services.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Reachable, but reporting a problem.
    Degraded,
    Unhealthy,
    /// Not checked, e.g. no credential configured.
    #[default]
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of an adapter's own health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: None,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            version: None,
            message: Some(message.into()),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Health of one service type as reported by the aggregate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether a credential is configured for this service type.
    pub enabled: bool,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_duration_ms: Option<u64>,
}

impl ServiceStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            status: HealthStatus::Unknown,
            message: Some("not configured".to_string()),
            version: None,
            credential_id: None,
            check_duration_ms: None,
        }
    }

    pub fn unhealthy(credential_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            enabled: true,
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            version: None,
            credential_id,
            check_duration_ms: None,
        }
    }

    pub fn from_health(credential_id: String, health: ServiceHealth) -> Self {
        Self {
            enabled: true,
            status: health.status,
            message: health.message,
            version: health.version,
            credential_id: Some(credential_id),
            check_duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.check_duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

/// Aggregate health of all upstream services.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemHealth {
    /// `healthy` unless an enabled service is not healthy, then `degraded`.
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    /// Keyed by service type.
    pub services: BTreeMap<String, ServiceStatus>,
}

impl SystemHealth {
    pub fn from_services(services: BTreeMap<String, ServiceStatus>) -> Self {
        let degraded = services
            .values()
            .any(|s| s.enabled && s.status != HealthStatus::Healthy);
        Self {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            timestamp: Utc::now(),
            services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        let mut services = BTreeMap::new();
        services.insert("grafana".to_string(), ServiceStatus::disabled());
        services.insert(
            "prometheus".to_string(),
            ServiceStatus::from_health("p".to_string(), ServiceHealth::healthy()),
        );
        assert_eq!(
            SystemHealth::from_services(services.clone()).status,
            HealthStatus::Healthy
        );

        services.insert(
            "proxmox".to_string(),
            ServiceStatus::unhealthy(Some("x".to_string()), "connection refused"),
        );
        assert_eq!(
            SystemHealth::from_services(services).status,
            HealthStatus::Degraded
        );
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ServiceStatus::disabled()).unwrap();
        assert!(json.contains(r#""status":"unknown""#));
        assert!(json.contains(r#""enabled":false"#));
        assert!(!json.contains("credential_id"));
    }
}
