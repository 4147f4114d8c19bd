//! Credential service: validation rules over the credential store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{AuthScheme, Credential, CredentialPatch, NewCredential, ServiceType};
use super::validation::{normalize, normalize_endpoint, normalize_secret, resolve_auth, validate_id};
use crate::config::SeedCredential;
use crate::database::repositories::CredentialRepository;
use crate::database::time::{ms_to_datetime, now_ms};
use crate::{Error, Result};

const ENTITY: &str = "Credential";

/// CRUD and lookup operations for service credentials.
#[derive(Clone)]
pub struct CredentialService {
    repo: Arc<dyn CredentialRepository>,
}

impl CredentialService {
    pub fn new(repo: Arc<dyn CredentialRepository>) -> Self {
        Self { repo }
    }

    /// All credentials, oldest first.
    pub async fn list(&self) -> Result<Vec<Credential>> {
        self.repo
            .list()
            .await?
            .into_iter()
            .map(Credential::try_from)
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Credential> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))
            .and_then(Credential::try_from)
    }

    /// Credentials of one service type, most recently updated first.
    ///
    /// Returns [`Error::NotFound`] when none are configured.
    pub async fn get_by_service_type(&self, service_type: ServiceType) -> Result<Vec<Credential>> {
        let credentials = self
            .repo
            .list_by_service_type(service_type.as_str())
            .await?
            .into_iter()
            .map(Credential::try_from)
            .collect::<Result<Vec<_>>>()?;

        if credentials.is_empty() {
            return Err(Error::not_found(
                "Credentials for service type",
                service_type.as_str(),
            ));
        }
        Ok(credentials)
    }

    pub async fn create(&self, input: NewCredential) -> Result<Credential> {
        let id = match normalize(input.id) {
            Some(id) => {
                validate_id(&id)?;
                id
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        let service_type = ServiceType::parse(&input.service_type)?;
        let endpoint = normalize_endpoint(&input.endpoint)?;
        let auth = resolve_auth(
            service_type,
            normalize(input.username),
            normalize_secret(input.password),
            normalize_secret(input.api_key),
        )?;

        let now = ms_to_datetime(now_ms());
        let credential = Credential {
            id,
            service_type,
            endpoint,
            auth,
            verify_tls: input.verify_tls.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        self.repo.insert(&credential.clone().into_db_model()).await?;
        info!(
            id = %credential.id,
            service_type = %credential.service_type,
            "Created credential"
        );
        Ok(credential)
    }

    /// Apply a partial update and re-validate the merged record.
    pub async fn update(&self, id: &str, patch: CredentialPatch) -> Result<Credential> {
        let current = self.get(id).await?;

        let service_type = match patch.service_type.as_deref() {
            Some(raw) => ServiceType::parse(raw)?,
            None => current.service_type,
        };
        let endpoint = match patch.endpoint.as_deref() {
            Some(raw) => normalize_endpoint(raw)?,
            None => current.endpoint.clone(),
        };

        let (mut username, mut password, mut api_key) = match current.auth.clone() {
            AuthScheme::Basic { username, password } => (Some(username), Some(password), None),
            AuthScheme::ApiKey(key) => (None, None, Some(key)),
        };
        if let Some(value) = patch.username {
            username = normalize(value);
        }
        if let Some(value) = patch.password {
            password = normalize_secret(value);
        }
        if let Some(value) = patch.api_key {
            api_key = normalize_secret(value);
        }
        let auth = resolve_auth(service_type, username, password, api_key)?;

        // Strictly increasing so "most recently updated" stays well defined.
        let updated_at = now_ms().max(current.updated_at.timestamp_millis() + 1);
        let updated = Credential {
            id: current.id.clone(),
            service_type,
            endpoint,
            auth,
            verify_tls: patch.verify_tls.unwrap_or(current.verify_tls),
            created_at: current.created_at,
            updated_at: ms_to_datetime(updated_at),
        };

        self.repo.update(&updated.clone().into_db_model()).await?;
        info!(id = %updated.id, service_type = %updated.service_type, "Updated credential");
        Ok(updated)
    }

    /// Delete a credential. Deleting a missing id is [`Error::NotFound`].
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(Error::not_found(ENTITY, id));
        }
        info!(id = %id, "Deleted credential");
        Ok(())
    }

    /// Pick the credential an adapter should use.
    ///
    /// With an explicit id the stored credential must belong to `service_type`;
    /// otherwise the most recently updated credential of that type wins.
    pub async fn resolve(&self, service_type: ServiceType, id: Option<&str>) -> Result<Credential> {
        match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                let credential = self.get(id).await?;
                if credential.service_type != service_type {
                    return Err(Error::validation(format!(
                        "credential '{}' belongs to {}, not {}",
                        id, credential.service_type, service_type
                    )));
                }
                Ok(credential)
            }
            None => {
                let row = self
                    .repo
                    .list_by_service_type(service_type.as_str())
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::not_found("Credentials for service type", service_type.as_str())
                    })?;
                let credential = Credential::try_from(row)?;
                debug!(id = %credential.id, service_type = %service_type, "Resolved credential");
                Ok(credential)
            }
        }
    }

    /// Insert `<type>-default` credentials for service types that have none yet.
    ///
    /// Invalid seeds are logged and skipped. Returns the number inserted.
    pub async fn seed_defaults(&self, seeds: &[SeedCredential]) -> Result<usize> {
        let mut inserted = 0;
        for seed in seeds {
            let service_type = seed.service_type;
            if self.repo.count_by_service_type(service_type.as_str()).await? > 0 {
                debug!(service_type = %service_type, "Credentials already present; skipping seed");
                continue;
            }

            let input = NewCredential {
                id: Some(format!("{}-default", service_type.as_str())),
                service_type: service_type.as_str().to_string(),
                endpoint: seed.endpoint.clone(),
                username: seed.username.clone(),
                password: seed.password.clone(),
                api_key: seed.api_key.clone(),
                verify_tls: Some(seed.verify_tls),
            };

            match self.create(input).await {
                Ok(_) => inserted += 1,
                Err(Error::Validation(msg)) | Err(Error::Conflict(msg)) => {
                    warn!(service_type = %service_type, "Skipping default credential: {}", msg);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }
}
