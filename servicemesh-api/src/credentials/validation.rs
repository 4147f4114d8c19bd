//! Field validation for credential input.

use url::Url;

use super::types::{AuthScheme, ServiceType};
use crate::{Error, Result};

/// Maximum length of a credential id.
pub const MAX_ID_LEN: usize = 64;

/// Trim a string and treat blank values as absent.
pub fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Like [`normalize`], but keeps non-blank secrets byte-for-byte.
pub fn normalize_secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(Error::validation(format!(
            "id must be between 1 and {} characters",
            MAX_ID_LEN
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::validation(
            "id may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

/// Validate an endpoint URL and return it without trailing slashes.
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("endpoint is required"));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| Error::validation(format!("endpoint is not a valid URL: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::validation("endpoint must use http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::validation("endpoint must include a host"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(Error::validation(
            "endpoint must not contain a query string or fragment",
        ));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Resolve the authentication scheme from the (already normalized) auth fields
/// and check that `service_type` accepts it.
pub fn resolve_auth(
    service_type: ServiceType,
    username: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
) -> Result<AuthScheme> {
    let auth = match (username, password, api_key) {
        (Some(username), Some(password), None) => AuthScheme::Basic { username, password },
        (None, None, Some(key)) => AuthScheme::ApiKey(key),
        (None, None, None) => {
            return Err(Error::validation(format!(
                "{} credentials require {}",
                service_type,
                required_fields(service_type)
            )));
        }
        (_, _, Some(_)) => {
            return Err(Error::validation(
                "provide either username/password or api_key, not both",
            ));
        }
        (Some(_), None, None) => return Err(Error::validation("password is required")),
        (None, Some(_), None) => return Err(Error::validation("username is required")),
    };

    if !service_type.accepts(auth.kind()) {
        return Err(Error::validation(format!(
            "{} does not support {} authentication; it requires {}",
            service_type,
            auth.kind(),
            required_fields(service_type)
        )));
    }

    Ok(auth)
}

fn required_fields(service_type: ServiceType) -> &'static str {
    if service_type == ServiceType::UptimeKuma {
        "username and password"
    } else {
        "username and password, or api_key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::types::AuthKind;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("kuma-1").is_ok());
        assert!(validate_id("prom.main_2").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("has space").is_err());
        assert!(validate_id("slash/id").is_err());
        assert!(validate_id(&"a".repeat(MAX_ID_LEN)).is_ok());
        assert!(validate_id(&"a".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint(" http://kuma.local:3001/ ").unwrap(),
            "http://kuma.local:3001"
        );
        assert_eq!(
            normalize_endpoint("https://pve.lan:8006").unwrap(),
            "https://pve.lan:8006"
        );
        assert_eq!(
            normalize_endpoint("https://example.com/grafana//").unwrap(),
            "https://example.com/grafana"
        );
        assert!(normalize_endpoint("").is_err());
        assert!(normalize_endpoint("kuma.local").is_err());
        assert!(normalize_endpoint("ftp://kuma.local").is_err());
        assert!(normalize_endpoint("http://kuma.local/?x=1").is_err());
    }

    #[test]
    fn test_normalize_treats_blank_as_absent() {
        assert_eq!(normalize(s("  ")), None);
        assert_eq!(normalize(s(" admin ")), s("admin"));
        assert_eq!(normalize(None), None);
        assert_eq!(normalize_secret(s(" p@ss ")), s(" p@ss "));
        assert_eq!(normalize_secret(s("\t")), None);
    }

    #[test]
    fn test_resolve_auth_schemes() {
        let basic = resolve_auth(ServiceType::UptimeKuma, s("u"), s("p"), None).unwrap();
        assert_eq!(basic.kind(), AuthKind::Basic);

        let key = resolve_auth(ServiceType::Grafana, None, None, s("token")).unwrap();
        assert_eq!(key.kind(), AuthKind::ApiKey);
    }

    #[test]
    fn test_resolve_auth_rejects_incomplete_or_mixed() {
        for (user, pass, key) in [
            (None, None, None),
            (s("u"), None, None),
            (None, s("p"), None),
            (s("u"), s("p"), s("k")),
            (s("u"), None, s("k")),
        ] {
            let err = resolve_auth(ServiceType::Prometheus, user, pass, key).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn test_uptime_kuma_rejects_api_key() {
        let err = resolve_auth(ServiceType::UptimeKuma, None, None, s("k")).unwrap_err();
        assert!(err.to_string().contains("uptime_kuma"));
    }
}
