//! Credential domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::models::CredentialDbModel;
use crate::database::time::ms_to_datetime;
use crate::{Error, Result};

/// Category of upstream tool a credential belongs to.
///
/// Stored and returned in snake_case; kebab-case aliases are accepted on input.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ServiceType {
    #[serde(alias = "uptime-kuma")]
    #[strum(to_string = "uptime_kuma", serialize = "uptime-kuma")]
    UptimeKuma,
    Prometheus,
    Grafana,
    Proxmox,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UptimeKuma => "uptime_kuma",
            Self::Prometheus => "prometheus",
            Self::Grafana => "grafana",
            Self::Proxmox => "proxmox",
        }
    }

    /// Parse a user-supplied service type, reporting unknown values as validation errors.
    pub fn parse(value: &str) -> Result<Self> {
        value.trim().parse().map_err(|_| {
            Error::validation(format!(
                "unknown service type '{}'; expected one of uptime_kuma, prometheus, grafana, proxmox",
                value
            ))
        })
    }

    /// Human readable product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::UptimeKuma => "Uptime Kuma",
            Self::Prometheus => "Prometheus",
            Self::Grafana => "Grafana",
            Self::Proxmox => "Proxmox VE",
        }
    }

    /// Whether this service type can authenticate with the given scheme.
    pub fn accepts(&self, kind: AuthKind) -> bool {
        match self {
            Self::UptimeKuma => kind == AuthKind::Basic,
            Self::Prometheus | Self::Grafana | Self::Proxmox => true,
        }
    }
}

/// Discriminant of [`AuthScheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AuthKind {
    #[strum(to_string = "basic")]
    Basic,
    #[strum(to_string = "api_key")]
    ApiKey,
}

/// Authentication material of a credential. Exactly one scheme is populated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic { username: String, password: String },
    ApiKey(String),
}

impl AuthScheme {
    pub fn kind(&self) -> AuthKind {
        match self {
            Self::Basic { .. } => AuthKind::Basic,
            Self::ApiKey(_) => AuthKind::ApiKey,
        }
    }
}

impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"********").finish(),
        }
    }
}

/// A stored, validated service credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub service_type: ServiceType,
    /// Absolute http(s) URL without a trailing slash.
    pub endpoint: String,
    pub auth: AuthScheme,
    pub verify_tls: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn username(&self) -> Option<&str> {
        match &self.auth {
            AuthScheme::Basic { username, .. } => Some(username),
            AuthScheme::ApiKey(_) => None,
        }
    }

    pub(crate) fn into_db_model(self) -> CredentialDbModel {
        let (username, password, api_key) = match self.auth {
            AuthScheme::Basic { username, password } => (Some(username), Some(password), None),
            AuthScheme::ApiKey(key) => (None, None, Some(key)),
        };
        CredentialDbModel {
            id: self.id,
            service_type: self.service_type.as_str().to_string(),
            endpoint: self.endpoint,
            username,
            password,
            api_key,
            verify_tls: self.verify_tls,
            created_at: self.created_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<CredentialDbModel> for Credential {
    type Error = Error;

    fn try_from(row: CredentialDbModel) -> Result<Self> {
        let service_type = ServiceType::parse(&row.service_type)?;
        let auth = match (row.username, row.password, row.api_key) {
            (Some(username), Some(password), None) => AuthScheme::Basic { username, password },
            (None, None, Some(key)) => AuthScheme::ApiKey(key),
            _ => {
                return Err(Error::Other(format!(
                    "stored credential '{}' has an inconsistent authentication scheme",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: row.id,
            service_type,
            endpoint: row.endpoint,
            auth,
            verify_tls: row.verify_tls,
            created_at: ms_to_datetime(row.created_at),
            updated_at: ms_to_datetime(row.updated_at),
        })
    }
}

/// Input for creating a credential. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct NewCredential {
    pub id: Option<String>,
    pub service_type: String,
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub verify_tls: Option<bool>,
}

/// Partial update of a credential.
///
/// Outer `None` keeps the stored value, `Some(None)` clears it and
/// `Some(Some(v))` replaces it.
#[derive(Debug, Clone, Default)]
pub struct CredentialPatch {
    pub service_type: Option<String>,
    pub endpoint: Option<String>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub api_key: Option<Option<String>>,
    pub verify_tls: Option<bool>,
}
