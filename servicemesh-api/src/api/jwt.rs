//! Bearer tokens for the vendor proxy routes.
//!
//! Tokens are HS256-signed with `SECRET_KEY` and carry fixed issuer and
//! audience claims, so a token minted for another service sharing the secret
//! is still rejected.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::{Error, Result};

/// Issuer claim of tokens minted for this API.
pub const JWT_ISSUER: &str = "servicemesh-api";

/// Audience claim of tokens minted for this API.
pub const JWT_AUDIENCE: &str = "servicemesh-api-clients";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Operator or client the token was minted for.
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid: {0}")]
    Invalid(String),
}

/// Signs and checks API bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[JWT_ISSUER]);
        validation.set_audience(&[JWT_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// `None` when no `SECRET_KEY` is configured, which leaves the vendor routes open.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let secret = config.secret_key.as_deref()?;
        let ttl = Duration::from_secs(config.access_token_expire_minutes * 60);
        info!(ttl_secs = ttl.as_secs(), "Bearer token auth enabled for vendor routes");
        Some(Self::new(secret, ttl))
    }

    /// Lifetime of minted tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<String> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(Error::validation("token subject must not be empty"));
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iss: JWT_ISSUER.to_string(),
            aud: JWT_AUDIENCE.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Other(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenRejection> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Invalid(e.to_string()),
            })
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
