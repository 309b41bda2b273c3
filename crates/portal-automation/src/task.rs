//! Task, audit and credential types shared by the engine and the stores.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task identifier.
pub type TaskId = Uuid;

/// Task lifecycle status.
///
/// Status only moves forward along `pending -> queued -> running ->
/// completed | failed`. Terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Queued => 1,
            TaskStatus::Running => 2,
            TaskStatus::Completed | TaskStatus::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the status monotonic.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// One unit of automation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: Uuid,

    /// Discriminator selecting the automation.
    pub task_type: String,

    pub status: TaskStatus,

    /// Higher runs first.
    pub priority: i32,

    /// Automation-specific payload.
    pub input_data: serde_json::Value,

    #[serde(default)]
    pub output_data: Option<serde_json::Value>,

    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub error_stack: Option<String>,

    #[serde(default)]
    pub screenshot_urls: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending task.
    pub fn new(tenant_id: Uuid, task_type: impl Into<String>, input_data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            priority: 0,
            input_data,
            output_data: None,
            error_message: None,
            error_stack: None,
            screenshot_urls: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Result object returned by an automation's `execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AutomationResult {
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Terminal state written back to the task record.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub completed_at: DateTime<Utc>,
    pub output_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub screenshot_urls: Vec<String>,
}

/// Audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    TaskStarted,
    Navigation,
    Authentication,
    DocumentUpload,
    Verification,
    TaskCompleted,
    TaskFailed,
    TaskError,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::TaskStarted => "task_started",
            AuditEvent::Navigation => "navigation",
            AuditEvent::Authentication => "authentication",
            AuditEvent::DocumentUpload => "document_upload",
            AuditEvent::Verification => "verification",
            AuditEvent::TaskCompleted => "task_completed",
            AuditEvent::TaskFailed => "task_failed",
            AuditEvent::TaskError => "task_error",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tenant_id: Uuid,
    pub task_id: TaskId,
    pub event_type: AuditEvent,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Decrypted credential bundle. Lives only for the duration of one task.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub additional_data: Option<serde_json::Value>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("additional_data", &self.additional_data.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
