//! Postgres-backed task queue, audit log and credential records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_automation::{AuditEntry, AuditLog, StoreError, Task, TaskId, TaskOutcome, TaskStore};

use uuid::Uuid;

use crate::db::models::{CredentialRecord, SealedCredentials};
use crate::db::queries::{
    audit as audit_queries, credential as credential_queries, task as task_queries,
};
use crate::db::DbPool;
use crate::error::WorkerResult;
use crate::vault::CredentialRepository;

/// Task queue over `automation_tasks`.
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn next_pending(&self) -> Result<Option<Task>, StoreError> {
        match task_queries::fetch_next_pending(&self.pool).await? {
            Some(row) => Ok(Some(Task::try_from(row)?)),
            None => Ok(None),
        }
    }

    async fn claim(&self, task_id: TaskId) -> Result<bool, StoreError> {
        Ok(task_queries::claim_task(&self.pool, task_id).await?)
    }

    async fn mark_running(&self, task_id: TaskId, started_at: DateTime<Utc>) -> Result<(), StoreError> {
        if task_queries::mark_running(&self.pool, task_id, started_at).await? {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition(format!(
                "task {task_id} is not pending or queued"
            )))
        }
    }

    async fn finish(&self, task_id: TaskId, outcome: &TaskOutcome) -> Result<(), StoreError> {
        if task_queries::finish_task(&self.pool, task_id, outcome).await? {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition(format!(
                "task {task_id} is already terminal"
            )))
        }
    }
}

/// Audit trail over `automation_logs`.
#[derive(Clone)]
pub struct PgAuditLog {
    pool: DbPool,
}

impl PgAuditLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        Ok(audit_queries::insert_audit_log(&self.pool, entry).await?)
    }
}

/// Credential records in `service_credentials`.
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: DbPool,
}

impl PgCredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn find(&self, tenant_id: Uuid, service_name: &str) -> WorkerResult<Option<CredentialRecord>> {
        credential_queries::get_credential(&self.pool, tenant_id, service_name).await
    }

    async fn touch_last_used(&self, id: Uuid) -> WorkerResult<()> {
        credential_queries::touch_last_used(&self.pool, id).await
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        service_name: &str,
        sealed: &SealedCredentials,
    ) -> WorkerResult<Uuid> {
        credential_queries::upsert_credential(&self.pool, tenant_id, service_name, sealed).await
    }

    async fn delete(&self, tenant_id: Uuid, service_name: &str) -> WorkerResult<bool> {
        credential_queries::delete_credential(&self.pool, tenant_id, service_name).await
    }
}
