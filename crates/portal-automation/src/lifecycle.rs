//! Automation lifecycle engine.
//!
//! Wraps every automation's `execute` with status transitions, audit entries,
//! error capture and unconditional browser cleanup.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;

use crate::browser::BrowserTimeouts;
use crate::context::{AutomationContext, Services};
use crate::error::AutomationError;
use crate::result_ext::ResultExt;
use crate::task::{AuditEntry, AuditEvent, AutomationResult, Task, TaskOutcome, TaskStatus};

/// An ordered sequence of portal interactions for one task type.
#[async_trait]
pub trait Automation: Send + Sync {
    /// Short name used in logs and audit entries.
    fn name(&self) -> &'static str;

    /// Run the steps. Errors are recorded by the engine as a failed task.
    async fn execute(&self, ctx: &mut AutomationContext) -> Result<AutomationResult, AutomationError>;
}

/// Runs automations to a terminal status.
#[derive(Clone)]
pub struct LifecycleEngine {
    services: Services,
    timeouts: BrowserTimeouts,
}

impl LifecycleEngine {
    pub fn new(services: Services, timeouts: BrowserTimeouts) -> Self {
        Self { services, timeouts }
    }

    /// Run `automation` for `task`.
    ///
    /// Never returns an error: failures become a failed task and a
    /// synthetic failure result. The browser session is released on every
    /// path before this returns.
    pub async fn run(&self, task: &Task, automation: &dyn Automation) -> AutomationResult {
        tracing::info!(
            task_id = %task.id,
            tenant_id = %task.tenant_id,
            automation = automation.name(),
            "Starting automation"
        );

        self.services
            .tasks
            .mark_running(task.id, Utc::now())
            .await
            .log(format!("marking task {} running", task.id));

        let mut ctx = AutomationContext::new(task.clone(), self.services.clone(), self.timeouts.clone());
        ctx.audit(
            AuditEvent::TaskStarted,
            format!("Started {} automation", automation.name()),
            json!({ "task_type": task.task_type }),
        )
        .await;

        let outcome = AssertUnwindSafe(automation.execute(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(AutomationError::Panicked(panic_message(panic))));

        let result = match outcome {
            Ok(result) => self.finish_returned(&mut ctx, result).await,
            Err(error) => self.finish_errored(&mut ctx, error).await,
        };

        ctx.release().await;
        result
    }

    async fn finish_returned(
        &self,
        ctx: &mut AutomationContext,
        result: AutomationResult,
    ) -> AutomationResult {
        let task_id = ctx.task().id;
        let (status, event) = if result.success {
            (TaskStatus::Completed, AuditEvent::TaskCompleted)
        } else {
            (TaskStatus::Failed, AuditEvent::TaskFailed)
        };

        let error_message = match (&result.error, result.success) {
            (Some(error), _) => Some(error.clone()),
            (None, false) => Some(result.message.clone()),
            (None, true) => None,
        };

        let outcome = TaskOutcome {
            status,
            completed_at: Utc::now(),
            output_data: result.data.clone(),
            error_message,
            error_stack: None,
            screenshot_urls: ctx.take_screenshots(),
        };
        self.persist(task_id, &outcome).await;

        ctx.audit(
            event,
            result.message.clone(),
            json!({
                "success": result.success,
                "data": result.data,
                "error": result.error,
                "screenshots": outcome.screenshot_urls.len(),
            }),
        )
        .await;

        tracing::info!(task_id = %task_id, status = %status, "Automation finished");
        result
    }

    async fn finish_errored(
        &self,
        ctx: &mut AutomationContext,
        error: AutomationError,
    ) -> AutomationResult {
        let task_id = ctx.task().id;
        tracing::error!(task_id = %task_id, error = %error, "Automation failed");

        ctx.screenshot("error").await;

        let message = error.to_string();
        let outcome = TaskOutcome {
            status: TaskStatus::Failed,
            completed_at: Utc::now(),
            output_data: None,
            error_message: Some(message.clone()),
            error_stack: Some(error.stack()),
            screenshot_urls: ctx.take_screenshots(),
        };
        self.persist(task_id, &outcome).await;

        ctx.audit(
            AuditEvent::TaskError,
            format!("Automation error: {message}"),
            json!({ "error": message, "screenshots": outcome.screenshot_urls }),
        )
        .await;

        AutomationResult::failure("Automation failed", message)
    }

    /// Record a task that could not be dispatched as failed, without running it.
    pub async fn reject(&self, task: &Task, error: &AutomationError) -> AutomationResult {
        tracing::error!(task_id = %task.id, task_type = %task.task_type, error = %error, "Task rejected");

        let message = error.to_string();
        let outcome = TaskOutcome {
            status: TaskStatus::Failed,
            completed_at: Utc::now(),
            output_data: None,
            error_message: Some(message.clone()),
            error_stack: Some(error.stack()),
            screenshot_urls: Vec::new(),
        };
        self.persist(task.id, &outcome).await;

        let entry = AuditEntry {
            tenant_id: task.tenant_id,
            task_id: task.id,
            event_type: AuditEvent::TaskError,
            message: format!("Task rejected: {message}"),
            data: json!({ "task_type": task.task_type, "error": message }),
            timestamp: Utc::now(),
        };
        self.services
            .audit
            .append(&entry)
            .await
            .log(format!("writing task_error audit entry for {}", task.id));

        AutomationResult::failure("Task rejected", message)
    }

    async fn persist(&self, task_id: crate::task::TaskId, outcome: &TaskOutcome) {
        self.services
            .tasks
            .finish(task_id, outcome)
            .await
            .log(format!("writing {} status for task {}", outcome.status, task_id));
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
