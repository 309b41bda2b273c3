//! Blob storage HTTP client.

use std::time::Duration;

use crate::config::StorageConfig;
use crate::error::{WorkerError, WorkerResult};

/// Uploads objects to a storage bucket over its REST API.
#[derive(Clone)]
pub struct BlobClient {
    client: reqwest::Client,
    base_url: String,
    public_base: String,
    bucket: String,
    api_key: Option<String>,
}

impl BlobClient {
    /// Create a client for `config`. Returns `None` when no storage URL is configured.
    pub fn from_config(config: &StorageConfig) -> Option<Self> {
        if !config.is_remote() {
            return None;
        }
        let base_url = config.url.as_deref()?.trim_end_matches('/').to_string();
        let public_base = config
            .public_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/storage/v1/object/public", base_url));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Some(Self {
            client,
            base_url,
            public_base,
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Public URL of an object.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    /// Upload (or overwrite) an object and return its public URL.
    pub async fn upload(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> WorkerResult<String> {
        let mut request = self
            .client
            .post(self.object_url(key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Storage(format!(
                "Upload of {} failed with status {}: {}",
                key, status, body
            )));
        }

        Ok(self.public_url(key))
    }
}

impl std::fmt::Debug for BlobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>) -> StorageConfig {
        StorageConfig {
            url: url.map(str::to_string),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn test_no_url_means_no_client() {
        assert!(BlobClient::from_config(&config(None)).is_none());
        assert!(BlobClient::from_config(&config(Some("  "))).is_none());
    }

    #[test]
    fn test_urls() {
        let client = BlobClient::from_config(&config(Some("https://blob.example.com/"))).unwrap();
        assert_eq!(
            client.object_url("t1/after-login.png"),
            "https://blob.example.com/storage/v1/object/screenshots/t1/after-login.png"
        );
        assert_eq!(
            client.public_url("t1/after-login.png"),
            "https://blob.example.com/storage/v1/object/public/screenshots/t1/after-login.png"
        );
    }

    #[test]
    fn test_public_url_override() {
        let mut cfg = config(Some("https://blob.example.com"));
        cfg.public_url = Some("https://cdn.example.com/".to_string());
        let client = BlobClient::from_config(&cfg).unwrap();
        assert_eq!(
            client.public_url("t1/error.png"),
            "https://cdn.example.com/screenshots/t1/error.png"
        );
    }
}
