// # Store Implementations
//
// File-backed implementations of the store traits. Each also has an
// in-memory mode for tests and ephemeral runs.

pub mod file;
pub mod log;
pub mod policy;
pub mod stats;

pub use file::JsonDocument;
pub use log::JsonLinesLogStore;
pub use policy::{JsonConfigStore, JsonPolicyStore};
pub use stats::JsonStatsStore;
