//! Result extension for fault-tolerant writes.
//!
//! Status, audit and artifact writes must never abort an automation. Callers
//! use [`ResultExt::log`] to record the failure and carry on.

use std::fmt::Display;
use tracing::warn;

/// Extension trait for logging errors with context.
pub trait ResultExt<T, E> {
    /// Log the error with context if this is an `Err` variant.
    ///
    /// # Returns
    ///
    /// The value on success, `None` on failure.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use portal_automation::ResultExt;
    ///
    /// let result: Result<i32, &str> = Err("connection reset");
    /// assert_eq!(result.log("writing audit entry"), None);
    /// ```
    fn log<S: Display>(self, context: S) -> Option<T>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: Display>(self, context: S) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                let caller_location = std::panic::Location::caller();
                warn!(
                    error = %e,
                    file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                    context = %context,
                    "Operation failed"
                );
                None
            }
        }
    }
}
