//! Row models for the worker's tables.

pub mod credential;
pub mod task;

pub use credential::*;
pub use task::*;
