//! Environment-driven application settings.

use std::time::Duration;

use crate::credentials::ServiceType;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:servicemesh.db?mode=rwc";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 6000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:6000";
pub const DEFAULT_TOKEN_EXPIRE_MINUTES: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse a comma separated list or a JSON array. `*` allows any origin.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let origins: Vec<String> = if raw.starts_with('[') {
            serde_json::from_str(raw)
                .map_err(|e| Error::config(format!("CORS_ORIGINS is not a JSON array: {}", e)))?
        } else {
            raw.split(',').map(str::to_string).collect()
        };

        let origins: Vec<String> = origins
            .into_iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        if origins.iter().any(|o| o == "*") {
            return Ok(Self::Any);
        }
        Ok(Self::List(origins))
    }
}

/// Default credential for one service type, taken from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedCredential {
    pub service_type: ServiceType,
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub verify_tls: bool,
}

impl std::fmt::Debug for SeedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedCredential")
            .field("service_type", &self.service_type)
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("has_api_key", &self.api_key.is_some())
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// Complete application configuration.
///
/// Built once at startup and passed explicitly to the components that need it.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_migration: bool,
    pub api_prefix: String,
    pub bind_address: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    pub secret_key: Option<String>,
    pub access_token_expire_minutes: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub default_timeout: Duration,
    pub seeds: Vec<SeedCredential>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("database_migration", &self.database_migration)
            .field("api_prefix", &self.api_prefix)
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("auth_enabled", &self.secret_key.is_some())
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("default_timeout", &self.default_timeout)
            .field("seeds", &self.seeds)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_migration: true,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            cors_origins: CorsOrigins::List(vec![DEFAULT_CORS_ORIGIN.to_string()]),
            secret_key: None,
            access_token_expire_minutes: DEFAULT_TOKEN_EXPIRE_MINUTES,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            seeds: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let api_prefix = match get("API_V1_STR") {
            Some(prefix) => normalize_prefix(&prefix),
            None => defaults.api_prefix,
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => CorsOrigins::parse(&raw)?,
            None => defaults.cors_origins,
        };

        let default_timeout = match get("DEFAULT_TIMEOUT") {
            Some(raw) => {
                let secs = parse_number::<u64>("DEFAULT_TIMEOUT", &raw)?;
                if secs == 0 {
                    return Err(Error::config("DEFAULT_TIMEOUT must be greater than zero"));
                }
                Duration::from_secs(secs)
            }
            None => defaults.default_timeout,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            database_migration: match get("DATABASE_MIGRATION") {
                Some(raw) => parse_bool("DATABASE_MIGRATION", &raw)?,
                None => defaults.database_migration,
            },
            api_prefix,
            bind_address: get("API_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: match get("API_PORT") {
                Some(raw) => parse_number("API_PORT", &raw)?,
                None => defaults.port,
            },
            cors_origins,
            secret_key: get("SECRET_KEY"),
            access_token_expire_minutes: match get("ACCESS_TOKEN_EXPIRE_MINUTES") {
                Some(raw) => parse_number("ACCESS_TOKEN_EXPIRE_MINUTES", &raw)?,
                None => defaults.access_token_expire_minutes,
            },
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_ascii_lowercase())
                .unwrap_or(defaults.log_level),
            log_dir: get("LOG_DIR"),
            default_timeout,
            seeds: seeds_from_lookup(&get)?,
        })
    }

    /// Whether bearer authentication is enforced on vendor routes.
    pub fn auth_enabled(&self) -> bool {
        self.secret_key.is_some()
    }
}

fn seeds_from_lookup<F>(get: &F) -> Result<Vec<SeedCredential>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut seeds = Vec::new();

    if let Some(endpoint) = get("UPTIME_KUMA_URL") {
        seeds.push(SeedCredential {
            service_type: ServiceType::UptimeKuma,
            endpoint,
            username: get("UPTIME_KUMA_USERNAME"),
            password: get("UPTIME_KUMA_PASSWORD"),
            api_key: None,
            verify_tls: true,
        });
    }

    if let Some(endpoint) = get("PROMETHEUS_URL") {
        seeds.push(SeedCredential {
            service_type: ServiceType::Prometheus,
            endpoint,
            username: get("PROMETHEUS_USERNAME"),
            password: get("PROMETHEUS_PASSWORD"),
            api_key: get("PROMETHEUS_API_KEY"),
            verify_tls: true,
        });
    }

    if let Some(endpoint) = get("GRAFANA_URL") {
        // An API key takes precedence over basic credentials.
        let api_key = get("GRAFANA_API_KEY");
        let (username, password) = if api_key.is_some() {
            (None, None)
        } else {
            (get("GRAFANA_USERNAME"), get("GRAFANA_PASSWORD"))
        };
        seeds.push(SeedCredential {
            service_type: ServiceType::Grafana,
            endpoint,
            username,
            password,
            api_key,
            verify_tls: true,
        });
    }

    if let Some(endpoint) = get("PROXMOX_URL") {
        let api_key = get("PROXMOX_API_TOKEN");
        let (username, password) = if api_key.is_some() {
            (None, None)
        } else {
            (get("PROXMOX_USERNAME"), get("PROXMOX_PASSWORD"))
        };
        seeds.push(SeedCredential {
            service_type: ServiceType::Proxmox,
            endpoint,
            username,
            password,
            api_key,
            verify_tls: match get("PROXMOX_VERIFY_SSL") {
                Some(raw) => parse_bool("PROXMOX_VERIFY_SSL", &raw)?,
                None => true,
            },
        });
    }

    Ok(seeds)
}

/// Ensure the prefix starts with exactly one `/` and has no trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| Error::config(format!("{} must be a number, got '{}'", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.port, 6000);
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert_eq!(config.access_token_expire_minutes, 30);
        assert!(config.database_migration);
        assert!(!config.auth_enabled());
        assert!(config.seeds.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("API_V1_STR", "api/v2/"),
            ("API_PORT", "8080"),
            ("DATABASE_MIGRATION", "false"),
            ("SECRET_KEY", "s3cret"),
            ("LOG_LEVEL", "DEBUG"),
            ("DEFAULT_TIMEOUT", "3"),
        ]))
        .unwrap();
        assert_eq!(config.api_prefix, "/api/v2");
        assert_eq!(config.port, 8080);
        assert!(!config.database_migration);
        assert!(config.auth_enabled());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let cases: [&[(&str, &str)]; 4] = [
            &[("API_PORT", "not-a-port")],
            &[("DATABASE_MIGRATION", "maybe")],
            &[("DEFAULT_TIMEOUT", "0")],
            &[("PROXMOX_URL", "https://pve"), ("PROXMOX_VERIFY_SSL", "sometimes")],
        ];
        for vars in cases {
            let result = AppConfig::from_lookup(lookup(vars));
            assert!(matches!(result, Err(Error::Configuration(_))), "{:?}", vars);
        }
    }

    #[test]
    fn test_cors_origins_parsing() {
        assert_eq!(CorsOrigins::parse("*").unwrap(), CorsOrigins::Any);
        assert_eq!(
            CorsOrigins::parse("http://a.local, http://b.local/").unwrap(),
            CorsOrigins::List(vec!["http://a.local".into(), "http://b.local".into()])
        );
        assert_eq!(
            CorsOrigins::parse(r#"["http://a.local"]"#).unwrap(),
            CorsOrigins::List(vec!["http://a.local".into()])
        );
        assert!(CorsOrigins::parse("[not json").is_err());
    }

    #[test]
    fn test_seeds_from_env() {
        let config = AppConfig::from_lookup(lookup(&[
            ("UPTIME_KUMA_URL", "http://kuma:3001"),
            ("UPTIME_KUMA_USERNAME", "admin"),
            ("UPTIME_KUMA_PASSWORD", "pw"),
            ("GRAFANA_URL", "http://grafana:3000"),
            ("GRAFANA_API_KEY", "glsa_x"),
            ("GRAFANA_USERNAME", "ignored"),
            ("PROXMOX_URL", "https://pve:8006"),
            ("PROXMOX_USERNAME", "root@pam"),
            ("PROXMOX_PASSWORD", "pw"),
            ("PROXMOX_VERIFY_SSL", "False"),
        ]))
        .unwrap();

        assert_eq!(config.seeds.len(), 3);
        let grafana = &config.seeds[1];
        assert_eq!(grafana.service_type, ServiceType::Grafana);
        assert_eq!(grafana.api_key.as_deref(), Some("glsa_x"));
        assert!(grafana.username.is_none());

        let proxmox = &config.seeds[2];
        assert!(!proxmox.verify_tls);
        assert_eq!(proxmox.username.as_deref(), Some("root@pam"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SECRET_KEY", "top-secret"),
            ("UPTIME_KUMA_URL", "http://kuma"),
            ("UPTIME_KUMA_PASSWORD", "kuma-pass"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("kuma-pass"));
    }
}
