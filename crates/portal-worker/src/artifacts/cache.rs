//! Local screenshot cache with time-based retention.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{WorkerError, WorkerResult};

/// What a purge removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub files_removed: usize,
    pub dirs_removed: usize,

    /// Entries skipped because they could not be inspected or removed.
    pub failures: usize,
}

impl PurgeReport {
    fn skip(&mut self, path: &Path, error: &WorkerError) {
        tracing::warn!(path = %path.display(), error = %error, "Skipping cache entry");
        self.failures += 1;
    }
}

/// Screenshots on local disk, laid out as `{dir}/{task_id}/{step}.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotCache {
    dir: PathBuf,
}

impl ScreenshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an object, creating its directory. Returns the file path.
    pub async fn write(&self, key: &str, bytes: &[u8]) -> WorkerResult<PathBuf> {
        let path = self.dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Delete files older than `max_age` and any task directory left empty.
    ///
    /// Only an unreadable cache root is an error. Entries that fail are
    /// logged, counted in [`PurgeReport::failures`] and left in place.
    pub async fn purge_older_than(&self, max_age: Duration) -> WorkerResult<PurgeReport> {
        let mut report = PurgeReport::default();
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut tasks = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        loop {
            let entry = match tasks.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    report.skip(&self.dir, &WorkerError::from(e));
                    break;
                }
            };
            let path = entry.path();
            let purged = match entry.file_type().await {
                Ok(kind) if kind.is_dir() => purge_task_dir(&path, cutoff, &mut report).await,
                Ok(_) => remove_if_expired(&path, cutoff).await.map(|removed| {
                    if removed {
                        report.files_removed += 1;
                    }
                }),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = purged {
                report.skip(&path, &e);
            }
        }

        tracing::info!(
            dir = %self.dir.display(),
            files_removed = report.files_removed,
            dirs_removed = report.dirs_removed,
            failures = report.failures,
            "Screenshot cache purged"
        );
        Ok(report)
    }
}

async fn purge_task_dir(dir: &Path, cutoff: SystemTime, report: &mut PurgeReport) -> WorkerResult<()> {
    let mut remaining = 0usize;
    let mut files = tokio::fs::read_dir(dir).await?;
    while let Some(file) = files.next_entry().await? {
        let path = file.path();
        let removed = match file.file_type().await {
            Ok(kind) if kind.is_file() => remove_if_expired(&path, cutoff).await,
            Ok(_) => Ok(false),
            Err(e) => Err(e.into()),
        };
        match removed {
            Ok(true) => report.files_removed += 1,
            Ok(false) => remaining += 1,
            Err(e) => {
                report.skip(&path, &e);
                remaining += 1;
            }
        }
    }

    if remaining == 0 {
        tokio::fs::remove_dir(dir).await?;
        report.dirs_removed += 1;
    }
    Ok(())
}

async fn remove_if_expired(path: &Path, cutoff: SystemTime) -> WorkerResult<bool> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    if modified >= cutoff {
        return Ok(false);
    }
    tokio::fs::remove_file(path).await?;
    Ok(true)
}
