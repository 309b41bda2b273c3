//! Portal Automation
//!
//! Runs queued browser automations against third-party HR portals:
//!
//! - `task` - task records, results, audit entries
//! - `ports` - storage seams (task queue, audit log, artifacts, credentials)
//! - `browser` - browser session abstraction and the Chromium driver
//! - `selectors` - named UI targets with ordered fallback selectors
//! - `lifecycle` - runs one automation to a terminal status
//! - `registry` - task type to automation mapping and dispatch
//! - `automations` - the built-in portal automations
//! - `memory` - in-memory store backends

pub mod automations;
pub mod browser;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod ports;
pub mod registry;
pub mod result_ext;
pub mod selectors;
pub mod task;

#[cfg(test)]
mod testing;

pub use automations::{create_default_registry, PortalSettings};
pub use browser::{BrowserLauncher, BrowserSession, BrowserTimeouts, ChromiumConfig, ChromiumLauncher, Page};
pub use context::{AutomationContext, Services};
pub use error::{AutomationError, BrowserError, StoreError};
pub use lifecycle::{Automation, LifecycleEngine};
pub use ports::{ArtifactStore, AuditLog, CredentialSource, TaskStore};
pub use registry::{AutomationRegistry, Dispatcher};
pub use result_ext::ResultExt;
pub use selectors::{Selector, SelectorRegistry, Target};
pub use task::{
    AuditEntry, AuditEvent, AutomationResult, Credentials, Task, TaskId, TaskOutcome, TaskStatus,
};
