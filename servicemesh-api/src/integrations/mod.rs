//! Adapters for the upstream monitoring and virtualization services.
//!
//! Each vendor gets one [`ServiceAdapter`] implementation. Handlers never build
//! adapters directly; they go through [`IntegrationFacade::open`], which picks
//! the credential and opens a session.

pub mod grafana;
mod health;
pub mod http;
pub mod prometheus;
pub mod proxmox;
pub mod uptime_kuma;

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, warn};

pub use grafana::GrafanaAdapter;
pub use health::{HealthStatus, ServiceHealth, ServiceStatus, SystemHealth};
pub use http::HttpSettings;
pub use prometheus::PrometheusAdapter;
pub use proxmox::ProxmoxAdapter;
pub use uptime_kuma::UptimeKumaAdapter;

use crate::credentials::{Credential, CredentialService, ServiceType};
use crate::{Error, Result};

/// A connected session against one upstream service.
#[async_trait]
pub trait ServiceAdapter: Sized + Send + Sync {
    /// The service type whose credentials this adapter consumes.
    const SERVICE_TYPE: ServiceType;

    /// Authenticate against the service and verify it is reachable.
    async fn connect(credential: &Credential, http: &HttpSettings) -> Result<Self>;

    async fn health(&self) -> Result<ServiceHealth>;
}

/// Entry point from the API layer into the adapters.
#[derive(Clone)]
pub struct IntegrationFacade {
    credentials: CredentialService,
    http: HttpSettings,
}

impl IntegrationFacade {
    pub fn new(credentials: CredentialService, http: HttpSettings) -> Self {
        Self { credentials, http }
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    /// Resolve a credential for `A` and open a session with it.
    pub async fn open<A: ServiceAdapter>(&self, credential_id: Option<&str>) -> Result<A> {
        let credential = self
            .credentials
            .resolve(A::SERVICE_TYPE, credential_id)
            .await?;
        debug!(
            service_type = %A::SERVICE_TYPE,
            credential_id = %credential.id,
            "Opening upstream session"
        );
        A::connect(&credential, &self.http).await
    }

    /// Check every service type concurrently.
    pub async fn check_all(&self) -> SystemHealth {
        let checks: Vec<BoxFuture<'_, (ServiceType, ServiceStatus)>> = vec![
            self.check_one::<UptimeKumaAdapter>().boxed(),
            self.check_one::<PrometheusAdapter>().boxed(),
            self.check_one::<GrafanaAdapter>().boxed(),
            self.check_one::<ProxmoxAdapter>().boxed(),
        ];

        let services: BTreeMap<String, ServiceStatus> = join_all(checks)
            .await
            .into_iter()
            .map(|(service_type, status)| (service_type.to_string(), status))
            .collect();
        SystemHealth::from_services(services)
    }

    async fn check_one<A: ServiceAdapter>(&self) -> (ServiceType, ServiceStatus) {
        let service_type = A::SERVICE_TYPE;
        let credential = match self.credentials.resolve(service_type, None).await {
            Ok(credential) => credential,
            Err(Error::NotFound { .. }) => return (service_type, ServiceStatus::disabled()),
            Err(e) => return (service_type, ServiceStatus::unhealthy(None, e.to_string())),
        };

        let started = Instant::now();
        let result = match A::connect(&credential, &self.http).await {
            Ok(adapter) => adapter.health().await,
            Err(e) => Err(e),
        };

        let status = match result {
            Ok(health) => ServiceStatus::from_health(credential.id, health),
            Err(e) => {
                warn!(service_type = %service_type, error = %e, "Health check failed");
                ServiceStatus::unhealthy(Some(credential.id), e.to_string())
            }
        };
        (service_type, status.with_duration(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credentials::NewCredential;
    use crate::database::repositories::SqlxCredentialRepository;

    async fn facade() -> IntegrationFacade {
        let pool = crate::database::init_pool("sqlite::memory:").await.unwrap();
        crate::database::run_migrations(&pool).await.unwrap();
        let credentials = CredentialService::new(Arc::new(SqlxCredentialRepository::new(pool)));
        IntegrationFacade::new(
            credentials,
            HttpSettings::new(std::time::Duration::from_secs(2)),
        )
    }

    #[tokio::test]
    async fn test_check_all_without_credentials() {
        let facade = facade().await;
        let health = facade.check_all().await;

        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.services.len(), 4);
        assert!(health.services.values().all(|s| !s.enabled));
        assert!(health.services.contains_key("uptime_kuma"));
    }

    #[tokio::test]
    async fn test_check_all_reports_unreachable_service() {
        let facade = facade().await;
        facade
            .credentials()
            .create(NewCredential {
                id: Some("prom".to_string()),
                service_type: "prometheus".to_string(),
                endpoint: "http://127.0.0.1:9".to_string(),
                api_key: Some("token".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let health = facade.check_all().await;
        assert_eq!(health.status, HealthStatus::Degraded);

        let prometheus = &health.services["prometheus"];
        assert!(prometheus.enabled);
        assert_eq!(prometheus.status, HealthStatus::Unhealthy);
        assert_eq!(prometheus.credential_id.as_deref(), Some("prom"));
        assert!(prometheus.check_duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_open_without_credential_is_not_found() {
        let facade = facade().await;
        let err = facade.open::<GrafanaAdapter>(None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
