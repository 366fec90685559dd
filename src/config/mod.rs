//! Configuration management for the visualizer worker
//!
//! - **schema**: the sections and keys the worker understands
//! - **document**: typed in-memory document with schema validation
//! - **store**: load/save/reset of the JSON file on disk

pub mod document;
pub mod error;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use document::{ConfigDocument, ConfigValue};
pub use error::ConfigError;
pub use store::ConfigStore;
