//! Service credential model.
//!
//! Every secret column holds `hex(iv):hex(ciphertext)`; plaintext is never
//! written to the table.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of `service_credentials`.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Third-party service the credentials belong to, e.g. `partner_portal`.
    pub service_name: String,

    pub encrypted_username: String,
    pub encrypted_password: String,

    #[sqlx(default)]
    pub encrypted_api_key: Option<String>,

    /// Encrypted JSON document.
    #[sqlx(default)]
    pub encrypted_additional_data: Option<String>,

    pub is_active: bool,

    #[sqlx(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Encrypted fields ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedCredentials {
    pub encrypted_username: String,
    pub encrypted_password: String,
    pub encrypted_api_key: Option<String>,
    pub encrypted_additional_data: Option<String>,
}
