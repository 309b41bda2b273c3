//! Blob storage configuration for screenshot uploads.

use serde::Deserialize;

/// Storage configuration loaded from environment variables.
///
/// Environment variables are prefixed with `STORAGE_`:
/// - `STORAGE_URL`: Storage service base URL; screenshots stay local when unset
/// - `STORAGE_BUCKET`: Bucket name (default: "screenshots")
/// - `STORAGE_API_KEY`: Service key sent as bearer token
/// - `STORAGE_PUBLIC_URL`: Base for public object URLs (default: derived from `STORAGE_URL`)
/// - `STORAGE_TIMEOUT_SECS`: Upload timeout (default: 30)
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bucket() -> String {
    "screenshots".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `STORAGE_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STORAGE_").from_env::<StorageConfig>()
    }

    pub fn is_remote(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            bucket: default_bucket(),
            api_key: None,
            public_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("bucket", &self.bucket)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("public_url", &self.public_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
