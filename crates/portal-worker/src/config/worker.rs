//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use portal_automation::{BrowserTimeouts, ChromiumConfig, PortalSettings};
use serde::Deserialize;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration loaded from environment variables.
///
/// Environment variables are prefixed with `WORKER_`:
/// - `WORKER_ENCRYPTION_KEY`: Master secret for the credential vault (required)
/// - `WORKER_POLL_INTERVAL_MS`: Task queue poll interval (default: 5000)
/// - `WORKER_ENVIRONMENT`: Runtime environment (default: "production")
/// - `WORKER_HEADLESS`: Force headless or headed browser (default: headed only in development)
/// - `WORKER_SCREENSHOT_DIR`: Local screenshot cache (default: "./screenshots")
/// - `WORKER_SCREENSHOT_RETENTION_DAYS`: Cache retention window (default: 7)
/// - `WORKER_LOG_FORMAT`: "text" or "json" (default: "text")
/// - `WORKER_SELECTORS_PATH`: YAML selector overrides (optional)
/// - `WORKER_PORTAL_URL`: Partner portal base URL
/// - `WORKER_CREDENTIAL_SERVICE`: Service name credentials are stored under
/// - `WORKER_ELEMENT_TIMEOUT_MS`, `WORKER_NAVIGATION_TIMEOUT_MS`: Browser wait budgets
/// - `WORKER_CHROME_EXECUTABLE`: Chrome binary to launch (optional)
#[derive(Clone, Deserialize)]
pub struct WorkerConfig {
    /// Master secret the vault key is derived from.
    pub encryption_key: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub headless: Option<bool>,

    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    #[serde(default = "default_retention_days")]
    pub screenshot_retention_days: u32,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default)]
    pub selectors_path: Option<PathBuf>,

    #[serde(default = "default_portal_url")]
    pub portal_url: String,

    #[serde(default = "default_credential_service")]
    pub credential_service: String,

    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

fn default_retention_days() -> u32 {
    7
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_portal_url() -> String {
    PortalSettings::default().base_url
}

fn default_credential_service() -> String {
    PortalSettings::default().service_name
}

fn default_element_timeout_ms() -> u64 {
    30_000
}

fn default_navigation_timeout_ms() -> u64 {
    60_000
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `WORKER_`.
    pub fn from_env() -> WorkerResult<Self> {
        let config = envy::prefixed("WORKER_").from_env::<WorkerConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(WorkerError::Config(
                "WORKER_POLL_INTERVAL_MS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.screenshot_retention_days) * 24 * 60 * 60)
    }

    /// Headed only in development unless overridden.
    pub fn headless(&self) -> bool {
        self.headless
            .unwrap_or(!self.environment.eq_ignore_ascii_case("development"))
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn browser_timeouts(&self) -> BrowserTimeouts {
        BrowserTimeouts {
            navigation: Duration::from_millis(self.navigation_timeout_ms),
            element: Duration::from_millis(self.element_timeout_ms),
            ..BrowserTimeouts::default()
        }
    }

    pub fn chromium(&self) -> ChromiumConfig {
        ChromiumConfig {
            headless: self.headless(),
            executable: self.chrome_executable.clone(),
            ..ChromiumConfig::default()
        }
    }

    pub fn portal(&self) -> PortalSettings {
        PortalSettings {
            base_url: self.portal_url.clone(),
            service_name: self.credential_service.clone(),
            ..PortalSettings::default()
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("encryption_key", &"<redacted>")
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("environment", &self.environment)
            .field("headless", &self.headless())
            .field("screenshot_dir", &self.screenshot_dir)
            .field("screenshot_retention_days", &self.screenshot_retention_days)
            .field("log_format", &self.log_format)
            .field("selectors_path", &self.selectors_path)
            .field("portal_url", &self.portal_url)
            .field("credential_service", &self.credential_service)
            .finish_non_exhaustive()
    }
}
