//! Built-in portal automations.
//!
//! - `document_upload` - upload employee documents to the partner portal

mod document_upload;

pub use self::document_upload::{
    default_selectors, DocumentUploadAutomation, DocumentUploadInput, PortalSettings,
    DOCUMENT_UPLOAD, REQUIRED_TARGETS,
};

use std::sync::Arc;

use crate::error::AutomationError;
use crate::lifecycle::Automation;
use crate::registry::AutomationRegistry;
use crate::selectors::SelectorRegistry;
use crate::task::Task;

/// Create a registry with all built-in automations registered.
///
/// `selectors` is layered over the built-in defaults, so it only needs the
/// entries that differ.
pub fn create_default_registry(
    portal: PortalSettings,
    selectors: SelectorRegistry,
) -> Result<AutomationRegistry, AutomationError> {
    let selectors = Arc::new(default_selectors().merge(selectors));
    selectors.validate(REQUIRED_TARGETS)?;
    let portal = Arc::new(portal);

    let mut registry = AutomationRegistry::new();
    registry.register(DOCUMENT_UPLOAD, move |task: &Task| {
        let automation = DocumentUploadAutomation::from_task(task, portal.clone(), selectors.clone())?;
        Ok(Box::new(automation) as Box<dyn Automation>)
    });

    Ok(registry)
}
