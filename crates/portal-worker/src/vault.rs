//! Credential vault: encrypted storage of third-party portal credentials.

use std::sync::Arc;

use async_trait::async_trait;
use portal_automation::{CredentialSource, Credentials, StoreError};
use uuid::Uuid;

use crate::crypto::Encryptor;
use crate::db::models::{CredentialRecord, SealedCredentials};
use crate::db::{DbPool, PgCredentialRepository};
use crate::error::WorkerResult;

/// Storage for sealed credential records.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// The record for a tenant and service, whether active or not.
    async fn find(&self, tenant_id: Uuid, service_name: &str) -> WorkerResult<Option<CredentialRecord>>;

    /// Stamp `last_used_at` with the current time.
    async fn touch_last_used(&self, id: Uuid) -> WorkerResult<()>;

    /// Insert or replace, leaving the record active.
    async fn upsert(
        &self,
        tenant_id: Uuid,
        service_name: &str,
        sealed: &SealedCredentials,
    ) -> WorkerResult<Uuid>;

    async fn delete(&self, tenant_id: Uuid, service_name: &str) -> WorkerResult<bool>;
}

/// Encrypts and decrypts credential bundles field by field.
#[derive(Clone, Debug)]
pub struct CredentialCipher {
    encryptor: Encryptor,
}

impl CredentialCipher {
    pub fn new(encryptor: Encryptor) -> Self {
        Self { encryptor }
    }

    /// Encrypt every present field.
    pub fn seal(&self, credentials: &Credentials) -> WorkerResult<SealedCredentials> {
        Ok(SealedCredentials {
            encrypted_username: self.encryptor.encrypt(&credentials.username)?,
            encrypted_password: self.encryptor.encrypt(&credentials.password)?,
            encrypted_api_key: credentials
                .api_key
                .as_deref()
                .map(|key| self.encryptor.encrypt(key))
                .transpose()?,
            encrypted_additional_data: credentials
                .additional_data
                .as_ref()
                .map(|data| self.encryptor.encrypt_json(data))
                .transpose()?,
        })
    }

    /// Decrypt every present field of a stored record.
    pub fn open(&self, record: &CredentialRecord) -> WorkerResult<Credentials> {
        Ok(Credentials {
            username: self.encryptor.decrypt(&record.encrypted_username)?,
            password: self.encryptor.decrypt(&record.encrypted_password)?,
            api_key: record
                .encrypted_api_key
                .as_deref()
                .map(|key| self.encryptor.decrypt(key))
                .transpose()?,
            additional_data: record
                .encrypted_additional_data
                .as_deref()
                .map(|data| self.encryptor.decrypt_json(data))
                .transpose()?,
        })
    }
}

/// Service for credential operations.
#[derive(Clone)]
pub struct CredentialVault {
    records: Arc<dyn CredentialRepository>,
    cipher: CredentialCipher,
}

impl CredentialVault {
    /// Create a vault over the `service_credentials` table.
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `master_secret` - Secret the encryption key is derived from
    pub fn new(pool: DbPool, master_secret: &str) -> WorkerResult<Self> {
        Self::with_repository(Arc::new(PgCredentialRepository::new(pool)), master_secret)
    }

    pub fn with_repository(
        records: Arc<dyn CredentialRepository>,
        master_secret: &str,
    ) -> WorkerResult<Self> {
        let encryptor = Encryptor::new(master_secret)?;
        Ok(Self {
            records,
            cipher: CredentialCipher::new(encryptor),
        })
    }

    /// Decrypted credentials, or `None` if no active record exists.
    ///
    /// A successful read stamps `last_used_at`; a failed stamp is logged and
    /// does not fail the read.
    pub async fn get_credentials(
        &self,
        tenant_id: Uuid,
        service_name: &str,
    ) -> WorkerResult<Option<Credentials>> {
        let record = match self.records.find(tenant_id, service_name).await? {
            Some(record) if record.is_active => record,
            Some(record) => {
                tracing::debug!(credential_id = %record.id, service = service_name, "Credentials are inactive");
                return Ok(None);
            }
            None => {
                tracing::debug!(tenant_id = %tenant_id, service = service_name, "No credentials stored");
                return Ok(None);
            }
        };

        let credentials = self.cipher.open(&record)?;

        if let Err(e) = self.records.touch_last_used(record.id).await {
            tracing::warn!(credential_id = %record.id, error = %e, "Failed to update last_used_at");
        }

        Ok(Some(credentials))
    }

    /// Encrypt and upsert credentials for a tenant and service.
    pub async fn store_credentials(
        &self,
        tenant_id: Uuid,
        service_name: &str,
        credentials: &Credentials,
    ) -> WorkerResult<Uuid> {
        let sealed = self.cipher.seal(credentials)?;
        let id = self.records.upsert(tenant_id, service_name, &sealed).await?;

        tracing::info!(tenant_id = %tenant_id, service = service_name, credential_id = %id, "Credentials stored");
        Ok(id)
    }

    /// Hard-delete credentials. Returns whether a record existed.
    pub async fn delete_credentials(&self, tenant_id: Uuid, service_name: &str) -> WorkerResult<bool> {
        let deleted = self.records.delete(tenant_id, service_name).await?;

        tracing::info!(tenant_id = %tenant_id, service = service_name, deleted, "Credentials deleted");
        Ok(deleted)
    }
}

#[async_trait]
impl CredentialSource for CredentialVault {
    async fn get_credentials(
        &self,
        tenant_id: Uuid,
        service_name: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        Ok(CredentialVault::get_credentials(self, tenant_id, service_name).await?)
    }
}
