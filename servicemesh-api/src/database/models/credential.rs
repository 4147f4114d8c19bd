//! Service credential database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the `service_credentials` table.
///
/// `service_type` holds the canonical snake_case name; conversion to the
/// typed enum happens in the credentials layer.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CredentialDbModel {
    pub id: String,
    pub service_type: String,
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub verify_tls: bool,
    /// Unix epoch milliseconds (UTC) when the credential was created.
    pub created_at: i64,
    /// Unix epoch milliseconds (UTC) when the credential was last updated.
    pub updated_at: i64,
}
