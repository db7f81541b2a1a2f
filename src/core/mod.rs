//! Core functionality for the watcher.
//!
//! This module contains:
//! - Heartbeat construction from editor context
//! - The rate limiter deciding which heartbeats are sent

pub mod heartbeat;
pub mod limiter;

// Re-export commonly used types
pub use heartbeat::{HeartbeatBuilder, HeartbeatData, HeartbeatRecord};
pub use limiter::{
    sanitize_rate, DispatchDecision, RateLimiter, DEFAULT_MAX_HEARTBEATS_PER_SEC,
};
