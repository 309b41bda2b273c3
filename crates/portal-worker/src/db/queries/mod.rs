//! Database queries organized by table.

pub mod audit;
pub mod credential;
pub mod task;
