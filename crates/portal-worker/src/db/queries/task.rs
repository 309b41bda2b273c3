//! Task queue queries.

use chrono::{DateTime, Utc};
use portal_automation::TaskOutcome;
use uuid::Uuid;

use crate::db::models::TaskRow;
use crate::db::DbPool;
use crate::error::WorkerResult;

/// Highest-priority, oldest pending task.
pub async fn fetch_next_pending(pool: &DbPool) -> WorkerResult<Option<TaskRow>> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT id, tenant_id, task_type, status, priority, input_data, output_data,
               error_message, error_stack, screenshot_urls, created_at, started_at, completed_at
        FROM automation_tasks
        WHERE status = 'pending'
        ORDER BY priority DESC, created_at ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Move a task from pending to queued. `false` if another worker got there first.
pub async fn claim_task(pool: &DbPool, id: Uuid) -> WorkerResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE automation_tasks
        SET status = 'queued'
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move a task to running. `false` if it was not pending or queued.
pub async fn mark_running(pool: &DbPool, id: Uuid, started_at: DateTime<Utc>) -> WorkerResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE automation_tasks
        SET status = 'running', started_at = $2
        WHERE id = $1 AND status IN ('pending', 'queued')
        "#,
    )
    .bind(id)
    .bind(started_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Write the terminal state. `false` if the task was already terminal.
pub async fn finish_task(pool: &DbPool, id: Uuid, outcome: &TaskOutcome) -> WorkerResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE automation_tasks
        SET status = $2, completed_at = $3, output_data = $4,
            error_message = $5, error_stack = $6, screenshot_urls = $7
        WHERE id = $1 AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(id)
    .bind(outcome.status.as_str())
    .bind(outcome.completed_at)
    .bind(&outcome.output_data)
    .bind(&outcome.error_message)
    .bind(&outcome.error_stack)
    .bind(&outcome.screenshot_urls)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
