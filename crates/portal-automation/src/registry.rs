//! Automation registry and dispatch.

use std::collections::HashMap;

use crate::error::AutomationError;
use crate::lifecycle::{Automation, LifecycleEngine};
use crate::task::{AutomationResult, Task};

/// Builds an automation for one task, validating its input.
pub type AutomationFactory =
    Box<dyn Fn(&Task) -> Result<Box<dyn Automation>, AutomationError> + Send + Sync>;

/// Static mapping from task type to automation constructor.
pub struct AutomationRegistry {
    factories: HashMap<String, AutomationFactory>,
}

impl AutomationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a constructor for a task type.
    pub fn register<F>(&mut self, task_type: impl Into<String>, factory: F)
    where
        F: Fn(&Task) -> Result<Box<dyn Automation>, AutomationError> + Send + Sync + 'static,
    {
        self.factories.insert(task_type.into(), Box::new(factory));
    }

    /// Check if a task type is registered.
    pub fn has(&self, task_type: &str) -> bool {
        self.factories.contains_key(task_type)
    }

    /// List all registered task types.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Construct the automation for `task`.
    pub fn create(&self, task: &Task) -> Result<Box<dyn Automation>, AutomationError> {
        let factory = self
            .factories
            .get(&task.task_type)
            .ok_or_else(|| AutomationError::UnknownTaskType(task.task_type.clone()))?;
        factory(task)
    }
}

impl Default for AutomationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AutomationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationRegistry")
            .field("task_types", &self.list())
            .finish()
    }
}

/// Routes a claimed task to its automation and runs it.
pub struct Dispatcher {
    registry: AutomationRegistry,
    engine: LifecycleEngine,
}

impl Dispatcher {
    pub fn new(registry: AutomationRegistry, engine: LifecycleEngine) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &AutomationRegistry {
        &self.registry
    }

    /// Run the task to a terminal status.
    ///
    /// Unknown task types and invalid input fail the task immediately.
    pub async fn dispatch(&self, task: &Task) -> AutomationResult {
        match self.registry.create(task) {
            Ok(automation) => self.engine.run(task, automation.as_ref()).await,
            Err(error) => self.engine.reject(task, &error).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    use crate::context::{AutomationContext, Services};
    use crate::memory::{MemoryArtifactStore, MemoryAuditLog, MemoryCredentials, MemoryTaskStore};
    use crate::task::TaskStatus;
    use crate::testing::{fast_timeouts, ScriptedBrowser};

    struct Noop;

    #[async_trait]
    impl Automation for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn execute(&self, _ctx: &mut AutomationContext) -> Result<AutomationResult, AutomationError> {
            Ok(AutomationResult::success("nothing to do", json!({})))
        }
    }

    fn noop_registry() -> AutomationRegistry {
        let mut registry = AutomationRegistry::new();
        registry.register("noop", |_task: &Task| Ok(Box::new(Noop) as Box<dyn Automation>));
        registry
    }

    #[test]
    fn test_registry_new() {
        let registry = AutomationRegistry::new();
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_registry_register() {
        let registry = noop_registry();

        assert!(registry.has("noop"));
        assert!(!registry.has("unknown"));
        assert_eq!(registry.list(), vec!["noop"]);
    }

    #[test]
    fn test_create_unknown_type() {
        let registry = noop_registry();
        let task = Task::new(Uuid::new_v4(), "fax_upload", json!({}));

        let result = registry.create(&task);
        assert!(matches!(result, Err(AutomationError::UnknownTaskType(t)) if t == "fax_upload"));
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_rejects() {
        let tasks = Arc::new(MemoryTaskStore::new());
        let services = Services {
            tasks: tasks.clone(),
            audit: Arc::new(MemoryAuditLog::new()),
            artifacts: Arc::new(MemoryArtifactStore::new()),
            credentials: Arc::new(MemoryCredentials::new()),
            launcher: Arc::new(ScriptedBrowser::new()),
        };
        let dispatcher = Dispatcher::new(
            noop_registry(),
            LifecycleEngine::new(services, fast_timeouts()),
        );

        let known = Task::new(Uuid::new_v4(), "noop", json!({}));
        let unknown = Task::new(Uuid::new_v4(), "fax_upload", json!({}));
        tasks.insert(known.clone());
        tasks.insert(unknown.clone());

        assert!(dispatcher.dispatch(&known).await.success);
        assert!(!dispatcher.dispatch(&unknown).await.success);

        assert_eq!(tasks.get(known.id).unwrap().status, TaskStatus::Completed);
        assert_eq!(tasks.get(unknown.id).unwrap().status, TaskStatus::Failed);
    }
}
