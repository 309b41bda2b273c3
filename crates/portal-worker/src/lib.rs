//! Portal Worker
//!
//! Polls the automation task queue and runs each task through the
//! automation engine.
//!
//! This crate provides:
//! - Environment configuration for the worker, database and blob storage
//! - Postgres task queue, audit log and credential vault
//! - AES-256-CBC credential encryption
//! - Screenshot storage with a local cache and retention purge
//! - The task queue poller

pub mod artifacts;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod poller;
pub mod vault;

pub use config::{DatabaseConfig, StorageConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use poller::{PollOutcome, Poller};
pub use vault::CredentialVault;
