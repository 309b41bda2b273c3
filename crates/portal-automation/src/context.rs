//! Per-task execution context handed to automations.

use std::sync::Arc;

use chrono::Utc;

use crate::browser::{BrowserLauncher, BrowserTimeouts, Page};
use crate::error::AutomationError;
use crate::ports::{ArtifactStore, AuditLog, CredentialSource, TaskStore};
use crate::result_ext::ResultExt;
use crate::task::{AuditEntry, AuditEvent, Credentials, Task};

/// Collaborators injected into the engine.
#[derive(Clone)]
pub struct Services {
    pub tasks: Arc<dyn TaskStore>,
    pub audit: Arc<dyn AuditLog>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub credentials: Arc<dyn CredentialSource>,
    pub launcher: Arc<dyn BrowserLauncher>,
}

/// Engine helpers available to an automation while it runs.
///
/// Owns the browser page for the task and the list of screenshot
/// references captured so far. The engine drains both once `execute`
/// returns.
pub struct AutomationContext {
    task: Task,
    services: Services,
    timeouts: BrowserTimeouts,
    page: Option<Page>,
    screenshots: Vec<String>,
}

impl AutomationContext {
    pub(crate) fn new(task: Task, services: Services, timeouts: BrowserTimeouts) -> Self {
        Self {
            task,
            services,
            timeouts,
            page: None,
            screenshots: Vec::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The task's browser page, launching the browser on first use.
    pub async fn page(&mut self) -> Result<&mut Page, AutomationError> {
        if self.page.is_none() {
            let session = self
                .services
                .launcher
                .launch()
                .await
                .map_err(AutomationError::Initialization)?;
            tracing::info!(task_id = %self.task.id, "Browser session started");
            self.page = Some(Page::new(session, self.timeouts.clone()));
        }
        self.page
            .as_mut()
            .ok_or_else(|| AutomationError::Initialization(crate::error::BrowserError::Closed))
    }

    /// Capture a full-page screenshot and store it as `{task_id}/{step}.png`.
    ///
    /// Best-effort: returns `None` on any failure, including when no browser
    /// has been started yet.
    pub async fn screenshot(&mut self, step: &str) -> Option<String> {
        let task_id = self.task.id;
        let page = self.page.as_mut()?;

        let bytes = page
            .screenshot()
            .await
            .log(format!("capturing screenshot '{step}'"))?;

        let key = format!("{task_id}/{step}.png");
        let url = self
            .services
            .artifacts
            .put_png(&key, bytes)
            .await
            .log(format!("uploading screenshot {key}"))?;

        tracing::debug!(task_id = %task_id, step, url = %url, "Screenshot stored");
        self.screenshots.push(url.clone());
        Some(url)
    }

    /// Append an audit entry. Failures are logged, never raised.
    pub async fn audit(
        &self,
        event: AuditEvent,
        message: impl Into<String>,
        data: serde_json::Value,
    ) {
        let entry = AuditEntry {
            tenant_id: self.task.tenant_id,
            task_id: self.task.id,
            event_type: event,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        };
        self.services
            .audit
            .append(&entry)
            .await
            .log(format!("writing {event} audit entry"));
    }

    /// Decrypted credentials for `service_name` under the task's tenant.
    pub async fn credentials(&self, service_name: &str) -> Result<Credentials, AutomationError> {
        self.services
            .credentials
            .get_credentials(self.task.tenant_id, service_name)
            .await
            .map_err(AutomationError::Credential)?
            .ok_or_else(|| AutomationError::CredentialsNotFound {
                tenant_id: self.task.tenant_id,
                service: service_name.to_string(),
            })
    }

    pub(crate) fn take_screenshots(&mut self) -> Vec<String> {
        std::mem::take(&mut self.screenshots)
    }

    /// Close the page and browser, if any were started.
    pub(crate) async fn release(&mut self) {
        if let Some(page) = self.page.take() {
            page.close().await.log("closing browser session");
            tracing::info!(task_id = %self.task.id, "Browser session released");
        }
    }
}
