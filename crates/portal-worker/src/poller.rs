//! Task queue poller.

use std::sync::Arc;
use std::time::Duration;

use portal_automation::{Dispatcher, TaskId, TaskStore};
use tokio::time::MissedTickBehavior;

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No pending task.
    Idle,
    /// Another worker claimed the task first.
    Raced(TaskId),
    /// The task ran to a terminal status.
    Ran { task_id: TaskId, success: bool },
    /// The queue could not be read or updated.
    StoreUnavailable,
}

/// Polls the queue and runs one task per tick.
pub struct Poller {
    tasks: Arc<dyn TaskStore>,
    dispatcher: Dispatcher,
    interval: Duration,
}

impl Poller {
    pub fn new(tasks: Arc<dyn TaskStore>, dispatcher: Dispatcher, interval: Duration) -> Self {
        Self {
            tasks,
            dispatcher,
            interval,
        }
    }

    /// Poll forever. The first poll runs immediately; a slow task delays the
    /// following ticks instead of bursting them.
    pub async fn run(&self) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            task_types = ?self.dispatcher.registry().list(),
            "Task poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Claim and run the next pending task, if any. Store errors are logged.
    pub async fn poll_once(&self) -> PollOutcome {
        let task = match self.tasks.next_pending().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::trace!("No pending tasks");
                return PollOutcome::Idle;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch pending tasks");
                return PollOutcome::StoreUnavailable;
            }
        };

        match self.tasks.claim(task.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(task_id = %task.id, "Task already claimed by another worker");
                return PollOutcome::Raced(task.id);
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to claim task");
                return PollOutcome::StoreUnavailable;
            }
        }

        tracing::info!(
            task_id = %task.id,
            tenant_id = %task.tenant_id,
            task_type = %task.task_type,
            priority = task.priority,
            "Task claimed"
        );

        let result = self.dispatcher.dispatch(&task).await;
        if result.success {
            tracing::info!(task_id = %task.id, message = %result.message, "Task completed");
        } else {
            tracing::warn!(
                task_id = %task.id,
                message = %result.message,
                error = result.error.as_deref().unwrap_or(""),
                "Task failed"
            );
        }

        PollOutcome::Ran {
            task_id: task.id,
            success: result.success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use portal_automation::memory::{
        MemoryArtifactStore, MemoryAuditLog, MemoryCredentials, MemoryTaskStore,
    };
    use portal_automation::{
        Automation, AutomationContext, AutomationError, AutomationRegistry, AutomationResult,
        BrowserError, BrowserLauncher, BrowserSession, BrowserTimeouts, LifecycleEngine, Services,
        StoreError, Task, TaskOutcome, TaskStatus,
    };
    use serde_json::json;
    use uuid::Uuid;

    struct NoBrowser;

    #[async_trait]
    impl BrowserLauncher for NoBrowser {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            Err(BrowserError::Launch("no browser in tests".to_string()))
        }
    }

    struct Echo;

    #[async_trait]
    impl Automation for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, ctx: &mut AutomationContext) -> Result<AutomationResult, AutomationError> {
            Ok(AutomationResult::success("echoed", ctx.task().input_data.clone()))
        }
    }

    fn poller_with(tasks: Arc<dyn TaskStore>) -> Poller {
        let services = Services {
            tasks: tasks.clone(),
            audit: Arc::new(MemoryAuditLog::new()),
            artifacts: Arc::new(MemoryArtifactStore::new()),
            credentials: Arc::new(MemoryCredentials::new()),
            launcher: Arc::new(NoBrowser),
        };
        let mut registry = AutomationRegistry::new();
        registry.register("echo", |_task: &Task| Ok(Box::new(Echo) as Box<dyn Automation>));
        let dispatcher = Dispatcher::new(
            registry,
            LifecycleEngine::new(services, BrowserTimeouts::default()),
        );
        Poller::new(tasks, dispatcher, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_idle_queue() {
        let poller = poller_with(Arc::new(MemoryTaskStore::new()));
        assert_eq!(poller.poll_once().await, PollOutcome::Idle);
    }

    #[tokio::test]
    async fn test_runs_highest_priority_first() {
        let store = Arc::new(MemoryTaskStore::new());
        let tenant = Uuid::new_v4();
        let low = Task::new(tenant, "echo", json!({ "n": 1 }));
        let high = Task::new(tenant, "echo", json!({ "n": 2 })).with_priority(10);
        store.insert(low.clone());
        store.insert(high.clone());
        let poller = poller_with(store.clone());

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Ran {
                task_id: high.id,
                success: true
            }
        );
        assert_eq!(store.get(high.id).unwrap().status, TaskStatus::Completed);
        assert_eq!(store.get(low.id).unwrap().status, TaskStatus::Pending);

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Ran {
                task_id: low.id,
                success: true
            }
        );
        assert_eq!(store.get(low.id).unwrap().output_data, Some(json!({ "n": 1 })));
        assert_eq!(poller.poll_once().await, PollOutcome::Idle);
    }

    #[tokio::test]
    async fn test_unknown_type_fails_task() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = Task::new(Uuid::new_v4(), "fax_upload", json!({}));
        store.insert(task.clone());
        let poller = poller_with(store.clone());

        assert_eq!(
            poller.poll_once().await,
            PollOutcome::Ran {
                task_id: task.id,
                success: false
            }
        );
        let stored = store.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(stored.error_message.unwrap().contains("fax_upload"));
    }

    /// Queue where every claim loses the race.
    struct ContendedStore(MemoryTaskStore);

    #[async_trait]
    impl TaskStore for ContendedStore {
        async fn next_pending(&self) -> Result<Option<Task>, StoreError> {
            self.0.next_pending().await
        }

        async fn claim(&self, _task_id: TaskId) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn mark_running(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), StoreError> {
            self.0.mark_running(task_id, at).await
        }

        async fn finish(&self, task_id: TaskId, outcome: &TaskOutcome) -> Result<(), StoreError> {
            self.0.finish(task_id, outcome).await
        }
    }

    #[tokio::test]
    async fn test_lost_claim_skips_task() {
        let inner = MemoryTaskStore::new();
        let task = Task::new(Uuid::new_v4(), "echo", json!({}));
        inner.insert(task.clone());
        let poller = poller_with(Arc::new(ContendedStore(inner)));

        assert_eq!(poller.poll_once().await, PollOutcome::Raced(task.id));
    }

    struct BrokenStore;

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn next_pending(&self) -> Result<Option<Task>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }

        async fn claim(&self, _task_id: TaskId) -> Result<bool, StoreError> {
            unreachable!()
        }

        async fn mark_running(&self, _task_id: TaskId, _at: DateTime<Utc>) -> Result<(), StoreError> {
            unreachable!()
        }

        async fn finish(&self, _task_id: TaskId, _outcome: &TaskOutcome) -> Result<(), StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let poller = poller_with(Arc::new(BrokenStore));
        assert_eq!(poller.poll_once().await, PollOutcome::StoreUnavailable);
        assert_eq!(poller.poll_once().await, PollOutcome::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_run_polls_immediately() {
        let store = Arc::new(MemoryTaskStore::new());
        let task = Task::new(Uuid::new_v4(), "echo", json!({}));
        store.insert(task.clone());
        let poller = Poller {
            interval: Duration::from_secs(3600),
            ..poller_with(store.clone())
        };

        let _ = tokio::time::timeout(Duration::from_millis(200), poller.run()).await;

        assert_eq!(store.get(task.id).unwrap().status, TaskStatus::Completed);
    }
}
