//! In-memory store backends.
//!
//! Used by tests and local dry runs in place of Postgres and blob storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ports::{ArtifactStore, AuditLog, CredentialSource, TaskStore};
use crate::task::{AuditEntry, AuditEvent, Credentials, Task, TaskId, TaskOutcome, TaskStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Task queue held in memory. Enforces monotonic status transitions.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: Task) {
        lock(&self.tasks).insert(task.id, task);
    }

    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        lock(&self.tasks).get(&task_id).cloned()
    }

    fn transition(&self, task_id: TaskId, next: TaskStatus) -> Result<(), StoreError> {
        let mut tasks = lock(&self.tasks);
        let task = tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
        if !task.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition(format!(
                "{} -> {} for task {}",
                task.status, next, task_id
            )));
        }
        task.status = next;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn next_pending(&self) -> Result<Option<Task>, StoreError> {
        let tasks = lock(&self.tasks);
        let next = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
            })
            .cloned();
        Ok(next)
    }

    async fn claim(&self, task_id: TaskId) -> Result<bool, StoreError> {
        let mut tasks = lock(&self.tasks);
        match tasks.get_mut(&task_id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Queued;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("task {task_id}"))),
        }
    }

    async fn mark_running(&self, task_id: TaskId, started_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.transition(task_id, TaskStatus::Running)?;
        if let Some(task) = lock(&self.tasks).get_mut(&task_id) {
            task.started_at = Some(started_at);
        }
        Ok(())
    }

    async fn finish(&self, task_id: TaskId, outcome: &TaskOutcome) -> Result<(), StoreError> {
        self.transition(task_id, outcome.status)?;
        if let Some(task) = lock(&self.tasks).get_mut(&task_id) {
            task.completed_at = Some(outcome.completed_at);
            task.output_data = outcome.output_data.clone();
            task.error_message = outcome.error_message.clone();
            task.error_stack = outcome.error_stack.clone();
            task.screenshot_urls = outcome.screenshot_urls.clone();
        }
        Ok(())
    }
}

/// Audit log held in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, task_id: TaskId) -> Vec<AuditEntry> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn event_types(&self, task_id: TaskId) -> Vec<AuditEvent> {
        self.entries(task_id).into_iter().map(|e| e.event_type).collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        lock(&self.entries).push(entry.clone());
        Ok(())
    }
}

/// Artifact store held in memory; references use the `memory://` scheme.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        lock(&self.objects).insert(key.to_string(), bytes);
        Ok(format!("memory://{key}"))
    }
}

/// Plaintext credentials keyed by tenant and service.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    records: Mutex<HashMap<(Uuid, String), Credentials>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, tenant_id: Uuid, service_name: &str, credentials: Credentials) -> Self {
        lock(&self.records).insert((tenant_id, service_name.to_string()), credentials);
        self
    }
}

#[async_trait]
impl CredentialSource for MemoryCredentials {
    async fn get_credentials(
        &self,
        tenant_id: Uuid,
        service_name: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        Ok(lock(&self.records)
            .get(&(tenant_id, service_name.to_string()))
            .cloned())
    }
}
