//! Audit log queries.

use portal_automation::AuditEntry;

use crate::db::DbPool;
use crate::error::WorkerResult;

/// Append one entry to `automation_logs`.
pub async fn insert_audit_log(pool: &DbPool, entry: &AuditEntry) -> WorkerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO automation_logs (tenant_id, task_id, event_type, message, data, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.tenant_id)
    .bind(entry.task_id)
    .bind(entry.event_type.as_str())
    .bind(&entry.message)
    .bind(&entry.data)
    .bind(entry.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}
