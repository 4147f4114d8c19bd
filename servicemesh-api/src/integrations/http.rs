//! Outbound HTTP plumbing shared by the service adapters.
//!
//! Every adapter talks to its vendor through an [`UpstreamClient`], which owns
//! the per-credential `reqwest::Client` (TLS verification is a credential
//! setting), applies authentication and maps upstream failures onto [`Error`].

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, COOKIE, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::{Credential, ServiceType};
use crate::{Error, Result};

/// User agent sent to upstream services.
pub const DEFAULT_USER_AGENT: &str = concat!("servicemesh-api/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error snippet carried into error messages.
const MAX_UPSTREAM_MESSAGE_LEN: usize = 200;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed a provider first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Settings for outbound vendor calls.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Upper bound for a single upstream request, connect included.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build a client for one credential.
    pub fn build_client(&self, verify_tls: bool) -> Result<reqwest::Client> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(&self.user_agent);

        if !verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))
    }
}

/// How requests are authenticated against the upstream API.
#[derive(Clone)]
pub enum RequestAuth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
    /// A pre-rendered `Authorization` header value.
    Header(HeaderValue),
    /// Cookie session; mutating requests also carry a CSRF header.
    Session {
        cookie: HeaderValue,
        csrf_header: &'static str,
        csrf_token: HeaderValue,
    },
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Basic { .. } => "Basic",
            Self::Bearer(_) => "Bearer",
            Self::Header(_) => "Header",
            Self::Session { .. } => "Session",
        };
        f.write_str(name)
    }
}

/// Identifies the addressed upstream object for 404 mapping.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub entity: &'a str,
    pub id: &'a str,
}

impl<'a> Target<'a> {
    pub fn new(entity: &'a str, id: &'a str) -> Self {
        Self { entity, id }
    }
}

/// HTTP client bound to one upstream service instance.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    service: ServiceType,
    base_url: String,
    client: reqwest::Client,
    auth: RequestAuth,
}

impl UpstreamClient {
    /// Create a client rooted at `credential.endpoint` + `api_root`.
    pub fn new(credential: &Credential, api_root: &str, settings: &HttpSettings) -> Result<Self> {
        let base_url = format!(
            "{}/{}",
            credential.endpoint,
            api_root.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string();

        Ok(Self {
            service: credential.service_type,
            base_url,
            client: settings.build_client(credential.verify_tls)?,
            auth: RequestAuth::None,
        })
    }

    pub fn with_auth(mut self, auth: RequestAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of `path` followed by caller-supplied segments.
    ///
    /// Each segment is percent-encoded as exactly one path segment, so `/` and
    /// dot segments in user input cannot climb out of `path`.
    pub fn segment_url(&self, path: &str, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.trim().is_empty() || **s == "." || **s == "..")
        {
            return Err(Error::validation(format!(
                "'{}' is not a valid path segment",
                bad
            )));
        }

        let mut url = Url::parse(&self.url(path))
            .map_err(|e| Error::config(format!("invalid upstream URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("upstream URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request with authentication applied.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        self.authorize(method, url)
    }

    /// Like [`request`](Self::request), with encoded trailing segments.
    pub fn request_at(
        &self,
        method: Method,
        path: &str,
        segments: &[&str],
    ) -> Result<RequestBuilder> {
        let url = self.segment_url(path, segments)?;
        Ok(self.authorize(method, url))
    }

    fn authorize(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let mutating = method != Method::GET && method != Method::HEAD;
        let builder = self.client.request(method, url);
        match &self.auth {
            RequestAuth::None => builder,
            RequestAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            RequestAuth::Bearer(token) => builder.bearer_auth(token),
            RequestAuth::Header(value) => builder.header(AUTHORIZATION, value.clone()),
            RequestAuth::Session {
                cookie,
                csrf_header,
                csrf_token,
            } => {
                let builder = builder.header(COOKIE, cookie.clone());
                if mutating {
                    builder.header(*csrf_header, csrf_token.clone())
                } else {
                    builder
                }
            }
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Send a request and turn non-success statuses into errors.
    pub async fn send(&self, request: RequestBuilder, target: Option<Target<'_>>) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(self.service, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(self.service, status, &body, target, &path))
    }

    /// Send a request and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        target: Option<Target<'_>>,
    ) -> Result<T> {
        let response = self.send(request, target).await?;
        response.json::<T>().await.map_err(|e| {
            Error::unavailable(format!(
                "{} returned an undecodable response: {}",
                self.service.display_name(),
                e
            ))
        })
    }

    /// Send a request and return the body as text.
    pub async fn text(&self, request: RequestBuilder, target: Option<Target<'_>>) -> Result<String> {
        let response = self.send(request, target).await?;
        response.text().await.map_err(|e| {
            Error::unavailable(format!(
                "{} response body could not be read: {}",
                self.service.display_name(),
                e
            ))
        })
    }
}

/// Map a failed send (DNS, connect, TLS, timeout) to [`Error::ServiceUnavailable`].
pub fn transport_error(service: ServiceType, err: &reqwest::Error) -> Error {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    };
    warn!(service = %service, error = %err, "Upstream request failed");
    Error::unavailable(format!("{} is unreachable: {}", service.display_name(), reason))
}

/// Map a non-success upstream status onto the crate error taxonomy.
pub fn status_error(
    service: ServiceType,
    status: StatusCode,
    body: &str,
    target: Option<Target<'_>>,
    path: &str,
) -> Error {
    let name = service.display_name();
    let detail = upstream_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("no details")
            .to_string()
    });
    debug!(service = %service, status = %status, detail = %detail, "Upstream returned error status");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::authentication(format!("{} rejected the credentials: {}", name, detail))
        }
        // Only an addressed object can be missing; anything else means the
        // endpoint or API root is wrong.
        StatusCode::NOT_FOUND => match target {
            Some(target) => Error::not_found(target.entity, target.id),
            None => Error::unavailable(format!("{} has no API at {}", name, path)),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::validation(format!("{} rejected the request: {}", name, detail))
        }
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            Error::conflict(format!("{}: {}", name, detail))
        }
        _ => Error::unavailable(format!("{} returned {}: {}", name, status.as_u16(), detail)),
    }
}

/// Extract a short human readable message from an upstream error body.
fn upstream_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => ["message", "error", "errors"]
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    };

    Some(truncate(&message, MAX_UPSTREAM_MESSAGE_LEN))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
