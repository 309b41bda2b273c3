//! Task queue model.

use chrono::{DateTime, Utc};
use portal_automation::{Task, TaskStatus};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::WorkerError;

/// Row of `automation_tasks`.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub task_type: String,
    pub status: String,
    pub priority: i32,
    pub input_data: serde_json::Value,

    #[sqlx(default)]
    pub output_data: Option<serde_json::Value>,

    #[sqlx(default)]
    pub error_message: Option<String>,

    #[sqlx(default)]
    pub error_stack: Option<String>,

    #[sqlx(default)]
    pub screenshot_urls: Option<Vec<String>>,

    pub created_at: DateTime<Utc>,

    #[sqlx(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[sqlx(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = WorkerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row
            .status
            .parse()
            .map_err(|e: String| WorkerError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(Task {
            id: row.id,
            tenant_id: row.tenant_id,
            task_type: row.task_type,
            status,
            priority: row.priority,
            input_data: row.input_data,
            output_data: row.output_data,
            error_message: row.error_message,
            error_stack: row.error_stack,
            screenshot_urls: row.screenshot_urls.unwrap_or_default(),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str) -> TaskRow {
        TaskRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            task_type: "document_upload".to_string(),
            status: status.to_string(),
            priority: 3,
            input_data: json!({ "employee_id": "E1" }),
            output_data: None,
            error_message: None,
            error_stack: None,
            screenshot_urls: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_row_to_task() {
        let task = Task::try_from(row("pending")).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, 3);
        assert!(task.screenshot_urls.is_empty());
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Task::try_from(row("archived")).is_err());
    }
}
