//! Dispatch statistics for the watcher.
//!
//! Counters are kept in memory for the life of the process and exposed
//! through the watcher status and the shutdown summary.

pub mod counters;

// Re-export commonly used types
pub use counters::{create_shared_stats, DispatchStats, SharedDispatchStats, StatsSnapshot};
