//! Automation error types.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// A UI target did not appear in time.
    #[error("Timed out after {}ms waiting for {target}", .timeout.as_millis())]
    Timeout { target: String, timeout: Duration },

    /// Page navigation failed.
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A located element could not be interacted with.
    #[error("Interaction with {target} failed: {reason}")]
    Interaction { target: String, reason: String },

    /// Low-level protocol failure.
    #[error("Browser protocol error: {0}")]
    Protocol(String),

    /// The session was already released.
    #[error("Browser session is closed")]
    Closed,
}

/// Errors raised by the backing stores (tasks, audit log, artifacts, credentials).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database or remote backend failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Credential decryption or lookup failure.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Artifact storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Status transition rejected.
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that fail a task.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// No automation registered for the task type.
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// Task input payload did not match the automation's schema.
    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    /// Browser session could not be created.
    #[error("Failed to initialize browser: {0}")]
    Initialization(#[source] BrowserError),

    /// No active credential record for the tenant/service pair.
    #[error("Credentials not found for service '{service}' (tenant {tenant_id})")]
    CredentialsNotFound { tenant_id: Uuid, service: String },

    /// Credential lookup or decryption failed.
    #[error(transparent)]
    Credential(StoreError),

    /// Selector registry is missing a target.
    #[error("No selectors registered for target '{0}'")]
    MissingSelector(String),

    /// Navigation or element failure.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// All steps ran but the postcondition did not hold.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The automation future panicked.
    #[error("Automation panicked: {0}")]
    Panicked(String),
}

impl AutomationError {
    /// Render the error and its source chain, one cause per line.
    pub fn stack(&self) -> String {
        let mut lines = vec![format!("{self:?}")];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            lines.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        lines.join("\n")
    }
}
