//! Screenshot storage.
//!
//! Every screenshot is written to the local cache. With blob storage
//! configured it is also uploaded and the public URL is returned; without
//! it the reference is a `file://` URL into the cache.

mod blob;
mod cache;

pub use blob::BlobClient;
pub use cache::{PurgeReport, ScreenshotCache};

use async_trait::async_trait;
use portal_automation::{ArtifactStore, StoreError};

/// Artifact store backed by the local cache and optional blob storage.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    cache: ScreenshotCache,
    blob: Option<BlobClient>,
}

impl ScreenshotStore {
    pub fn new(cache: ScreenshotCache, blob: Option<BlobClient>) -> Self {
        Self { cache, blob }
    }
}

#[async_trait]
impl ArtifactStore for ScreenshotStore {
    async fn put_png(&self, key: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let cached = self.cache.write(key, &bytes).await;

        match &self.blob {
            Some(blob) => {
                if let Err(e) = &cached {
                    tracing::warn!(key, error = %e, "Failed to cache screenshot locally");
                }
                Ok(blob.upload(key, "image/png", bytes).await?)
            }
            None => {
                let path = cached?;
                let path = std::path::absolute(&path).unwrap_or(path);
                Ok(format!("file://{}", path.display()))
            }
        }
    }
}
