//! Service credential queries.

use uuid::Uuid;

use crate::db::models::{CredentialRecord, SealedCredentials};
use crate::db::DbPool;
use crate::error::WorkerResult;

/// Credential record for a tenant and service, active or not.
pub async fn get_credential(
    pool: &DbPool,
    tenant_id: Uuid,
    service_name: &str,
) -> WorkerResult<Option<CredentialRecord>> {
    let record = sqlx::query_as::<_, CredentialRecord>(
        r#"
        SELECT id, tenant_id, service_name, encrypted_username, encrypted_password,
               encrypted_api_key, encrypted_additional_data, is_active, last_used_at,
               created_at, updated_at
        FROM service_credentials
        WHERE tenant_id = $1 AND service_name = $2
        "#,
    )
    .bind(tenant_id)
    .bind(service_name)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Record a successful retrieval.
pub async fn touch_last_used(pool: &DbPool, id: Uuid) -> WorkerResult<()> {
    sqlx::query(
        r#"
        UPDATE service_credentials
        SET last_used_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or replace the credentials for a tenant and service, reactivating the record.
pub async fn upsert_credential(
    pool: &DbPool,
    tenant_id: Uuid,
    service_name: &str,
    sealed: &SealedCredentials,
) -> WorkerResult<Uuid> {
    let result: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO service_credentials (
            tenant_id, service_name, encrypted_username, encrypted_password,
            encrypted_api_key, encrypted_additional_data, is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (tenant_id, service_name) DO UPDATE
        SET encrypted_username = EXCLUDED.encrypted_username,
            encrypted_password = EXCLUDED.encrypted_password,
            encrypted_api_key = EXCLUDED.encrypted_api_key,
            encrypted_additional_data = EXCLUDED.encrypted_additional_data,
            is_active = TRUE,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(service_name)
    .bind(&sealed.encrypted_username)
    .bind(&sealed.encrypted_password)
    .bind(&sealed.encrypted_api_key)
    .bind(&sealed.encrypted_additional_data)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// Hard-delete the credentials for a tenant and service.
pub async fn delete_credential(pool: &DbPool, tenant_id: Uuid, service_name: &str) -> WorkerResult<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM service_credentials
        WHERE tenant_id = $1 AND service_name = $2
        "#,
    )
    .bind(tenant_id)
    .bind(service_name)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
