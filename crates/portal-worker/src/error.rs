//! Error types for the portal worker.

use portal_automation::StoreError;
use thiserror::Error;

/// Worker-level errors: persistence, crypto, configuration and blob storage.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Encryption or decryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using WorkerError.
pub type WorkerResult<T> = Result<T, WorkerError>;

impl From<envy::Error> for WorkerError {
    fn from(err: envy::Error) -> Self {
        WorkerError::Config(err.to_string())
    }
}

impl From<WorkerError> for StoreError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Encryption(msg) => StoreError::Credential(msg),
            WorkerError::Storage(msg) => StoreError::Storage(msg),
            WorkerError::Http(e) => StoreError::Storage(e.to_string()),
            WorkerError::Io(e) => StoreError::Io(e),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = WorkerError::Config("poll interval must be at least 1ms".to_string());
        assert_eq!(err.to_string(), "Configuration error: poll interval must be at least 1ms");
    }

    #[test]
    fn test_encryption_maps_to_credential_error() {
        let err: StoreError = WorkerError::Encryption("bad padding".to_string()).into();
        assert!(matches!(err, StoreError::Credential(msg) if msg == "bad padding"));
    }

    #[test]
    fn test_config_maps_to_backend_error() {
        let err: StoreError = WorkerError::Config("missing key".to_string()).into();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
