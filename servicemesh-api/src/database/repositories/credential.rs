//! Service credential repository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::database::models::CredentialDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::{Error, Result};

/// Persistence operations for `service_credentials`.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// All credentials, oldest first.
    async fn list(&self) -> Result<Vec<CredentialDbModel>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialDbModel>>;

    /// Credentials of one service type, most recently updated first.
    async fn list_by_service_type(&self, service_type: &str) -> Result<Vec<CredentialDbModel>>;

    /// Insert a new row. A duplicate id yields [`Error::Conflict`].
    async fn insert(&self, credential: &CredentialDbModel) -> Result<()>;

    /// Overwrite every mutable column of an existing row.
    /// Yields [`Error::NotFound`] when no row has the given id.
    async fn update(&self, credential: &CredentialDbModel) -> Result<()>;

    /// Delete a row. Returns `false` when nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count_by_service_type(&self, service_type: &str) -> Result<i64>;
}

/// SQLx implementation of [`CredentialRepository`].
pub struct SqlxCredentialRepository {
    pool: SqlitePool,
}

impl SqlxCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for SqlxCredentialRepository {
    async fn list(&self) -> Result<Vec<CredentialDbModel>> {
        let rows = sqlx::query_as::<_, CredentialDbModel>(
            "SELECT * FROM service_credentials ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CredentialDbModel>> {
        let row = sqlx::query_as::<_, CredentialDbModel>(
            "SELECT * FROM service_credentials WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_by_service_type(&self, service_type: &str) -> Result<Vec<CredentialDbModel>> {
        let rows = sqlx::query_as::<_, CredentialDbModel>(
            r#"
            SELECT * FROM service_credentials
            WHERE service_type = ?
            ORDER BY updated_at DESC, created_at DESC, id ASC
            "#,
        )
        .bind(service_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self, credential), fields(id = %credential.id, service_type = %credential.service_type))]
    async fn insert(&self, credential: &CredentialDbModel) -> Result<()> {
        let result = retry_on_sqlite_busy("insert_credential", || async {
            sqlx::query(
                r#"
                INSERT INTO service_credentials (
                    id, service_type, endpoint, username, password, api_key,
                    verify_tls, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&credential.id)
            .bind(&credential.service_type)
            .bind(&credential.endpoint)
            .bind(&credential.username)
            .bind(&credential.password)
            .bind(&credential.api_key)
            .bind(credential.verify_tls)
            .bind(credential.created_at)
            .bind(credential.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await;

        match result {
            Err(err) if err.is_unique_violation() => Err(Error::conflict(format!(
                "credential with id '{}' already exists",
                credential.id
            ))),
            other => {
                if other.is_ok() {
                    debug!("Inserted credential");
                }
                other
            }
        }
    }

    #[instrument(skip(self, credential), fields(id = %credential.id))]
    async fn update(&self, credential: &CredentialDbModel) -> Result<()> {
        let rows = retry_on_sqlite_busy("update_credential", || async {
            let result = sqlx::query(
                r#"
                UPDATE service_credentials SET
                    service_type = ?,
                    endpoint = ?,
                    username = ?,
                    password = ?,
                    api_key = ?,
                    verify_tls = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&credential.service_type)
            .bind(&credential.endpoint)
            .bind(&credential.username)
            .bind(&credential.password)
            .bind(&credential.api_key)
            .bind(credential.verify_tls)
            .bind(credential.updated_at)
            .bind(&credential.id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if rows == 0 {
            return Err(Error::not_found("Credential", &credential.id));
        }
        debug!("Updated credential");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let rows = retry_on_sqlite_busy("delete_credential", || async {
            let result = sqlx::query("DELETE FROM service_credentials WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;
        Ok(rows > 0)
    }

    async fn count_by_service_type(&self, service_type: &str) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM service_credentials WHERE service_type = ?")
                .bind(service_type)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};

    async fn setup() -> SqlxCredentialRepository {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqlxCredentialRepository::new(pool)
    }

    fn basic_row(id: &str, service_type: &str, updated_at: i64) -> CredentialDbModel {
        CredentialDbModel {
            id: id.to_string(),
            service_type: service_type.to_string(),
            endpoint: "http://localhost:3001".to_string(),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            api_key: None,
            verify_tls: true,
            created_at: 1_000,
            updated_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup().await;
        let row = basic_row("kuma-1", "uptime_kuma", 1_000);
        repo.insert(&row).await.unwrap();

        let found = repo.find_by_id("kuma-1").await.unwrap();
        assert_eq!(found, Some(row));
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let repo = setup().await;
        let row = basic_row("dup", "grafana", 1_000);
        repo.insert(&row).await.unwrap();

        let err = repo.insert(&row).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_mixed_schemes() {
        let repo = setup().await;
        let mut row = basic_row("mixed", "prometheus", 1_000);
        row.api_key = Some("token".to_string());

        let err = repo.insert(&row).await.unwrap_err();
        assert!(matches!(err, Error::DatabaseSqlx(_)));
    }

    #[tokio::test]
    async fn test_list_by_service_type_orders_by_updated_at() {
        let repo = setup().await;
        repo.insert(&basic_row("old", "proxmox", 1_000)).await.unwrap();
        repo.insert(&basic_row("new", "proxmox", 5_000)).await.unwrap();
        repo.insert(&basic_row("other", "grafana", 9_000)).await.unwrap();

        let rows = repo.list_by_service_type("proxmox").await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(repo.count_by_service_type("proxmox").await.unwrap(), 2);
        assert_eq!(repo.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup().await;
        let mut row = basic_row("g", "grafana", 1_000);
        repo.insert(&row).await.unwrap();

        row.endpoint = "https://grafana.example.com".to_string();
        row.updated_at = 2_000;
        repo.update(&row).await.unwrap();
        let stored = repo.find_by_id("g").await.unwrap().unwrap();
        assert_eq!(stored.endpoint, "https://grafana.example.com");
        assert_eq!(stored.updated_at, 2_000);

        assert!(repo.delete("g").await.unwrap());
        assert!(!repo.delete("g").await.unwrap());

        let err = repo.update(&row).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
