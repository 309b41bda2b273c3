//! Configuration for the portal worker.
//!
//! Loaded from environment variables with `envy`, one prefix per concern.

mod database;
mod storage;
mod worker;

pub use database::DatabaseConfig;
pub use storage::StorageConfig;
pub use worker::WorkerConfig;
