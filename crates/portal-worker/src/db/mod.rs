//! Database access for the task queue, credential records and audit log.
//!
//! Postgres via SQLx: a connection pool, row models, query functions, and
//! the store implementations the automation engine is wired with.

pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use pool::{create_pool, DbPool};
pub use store::{PgAuditLog, PgCredentialRepository, PgTaskStore};
