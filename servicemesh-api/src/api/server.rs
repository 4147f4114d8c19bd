//! API server setup and configuration.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::jwt::JwtService;
use crate::api::routes;
use crate::config::{AppConfig, CorsOrigins, DEFAULT_API_PREFIX};
use crate::credentials::CredentialService;
use crate::database::DbPool;
use crate::database::repositories::SqlxCredentialRepository;
use crate::error::{Error, Result};
use crate::integrations::{HttpSettings, IntegrationFacade};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Prefix all routes are mounted under, e.g. `/api/v1`
    pub api_prefix: String,
    /// Allowed CORS origins
    pub cors_origins: CorsOrigins,
    /// Request body size limit in bytes
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self {
            bind_address: app.bind_address,
            port: app.port,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cors_origins: app.cors_origins,
            body_limit: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl ApiServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            port: config.port,
            api_prefix: config.api_prefix.clone(),
            cors_origins: config.cors_origins.clone(),
            ..Self::default()
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Database pool, used by the readiness check
    pub pool: DbPool,
    /// Credential CRUD
    pub credential_service: CredentialService,
    /// Entry point to the vendor adapters
    pub facade: IntegrationFacade,
    /// JWT service; `None` leaves the vendor routes open
    pub jwt_service: Option<Arc<JwtService>>,
}

impl AppState {
    /// Create application state over a migrated pool.
    pub fn new(pool: DbPool, http: HttpSettings) -> Self {
        let credential_service =
            CredentialService::new(Arc::new(SqlxCredentialRepository::new(pool.clone())));
        let facade = IntegrationFacade::new(credential_service.clone(), http);
        Self {
            start_time: Instant::now(),
            pool,
            credential_service,
            facade,
            jwt_service: None,
        }
    }

    /// Set the JWT service.
    pub fn with_jwt_service(mut self, jwt_service: Arc<JwtService>) -> Self {
        self.jwt_service = Some(jwt_service);
        self
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create with custom state.
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn cors_layer(&self) -> CorsLayer {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        match &self.config.cors_origins {
            CorsOrigins::Any => cors.allow_origin(Any),
            CorsOrigins::List(origins) => {
                let origins: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|origin| match HeaderValue::from_str(origin) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                            None
                        }
                    })
                    .collect();
                cors.allow_origin(AllowOrigin::list(origins))
            }
        }
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone(), &self.config.api_prefix)
            .layer(DefaultBodyLimit::max(self.config.body_limit))
            .layer(self.cors_layer());

        // Health checks are polled constantly; keep them out of the request log.
        let health_prefix = format!("{}/health", self.config.api_prefix.trim_end_matches('/'));
        let span_prefix = health_prefix.clone();

        router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(move |req: &Request| {
                    if req.uri().path().starts_with(&span_prefix) {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(move |req: &Request, span: &Span| {
                    if span.is_disabled() || req.uri().path().starts_with(&health_prefix) {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                )
                .on_failure(
                    |class: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let mut on_failure =
                            tower_http::trace::DefaultOnFailure::new().level(tracing::Level::ERROR);
                        use tower_http::trace::OnFailure;
                        on_failure.on_failure(class, latency, span);
                    },
                ),
        );
        router
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            "API server listening on http://{}{}",
            addr,
            self.config.api_prefix
        );

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 6000);
        assert_eq!(config.api_prefix, "/api/v1");
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            port: 8080,
            api_prefix: "/mesh".to_string(),
            cors_origins: CorsOrigins::Any,
            ..AppConfig::default()
        };
        let config = ApiServerConfig::from_app_config(&app);
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_prefix, "/mesh");
        assert_eq!(config.cors_origins, CorsOrigins::Any);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let pool = crate::database::init_pool("sqlite::memory:").await.unwrap();
        let state = AppState::new(pool, HttpSettings::default());
        let server = ApiServer::with_state(ApiServerConfig::default(), state);

        let token = server.cancel_token();
        assert!(!token.is_cancelled());
        server.shutdown();
        assert!(token.is_cancelled());
    }
}
