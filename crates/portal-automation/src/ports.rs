//! Store traits the engine depends on.
//!
//! The worker binary wires Postgres and blob-storage implementations in;
//! tests use the in-memory backends from [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::task::{AuditEntry, Credentials, Task, TaskId, TaskOutcome};

/// Task queue backend.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Highest-priority, oldest pending task, if any.
    async fn next_pending(&self) -> Result<Option<Task>, StoreError>;

    /// Move a pending task to queued. Returns `false` if it was no longer pending.
    async fn claim(&self, task_id: TaskId) -> Result<bool, StoreError>;

    /// Move a task to running.
    async fn mark_running(&self, task_id: TaskId, started_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Write the terminal state. Never reopens a terminal task.
    async fn finish(&self, task_id: TaskId, outcome: &TaskOutcome) -> Result<(), StoreError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;
}

/// Durable storage for screenshots.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store a PNG under `key` and return a durable reference (URL).
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// Read access to third-party service credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Decrypted credentials for the pair, or `None` if no active record exists.
    async fn get_credentials(
        &self,
        tenant_id: Uuid,
        service_name: &str,
    ) -> Result<Option<Credentials>, StoreError>;
}
