//! Editor context for the watcher.
//!
//! This module describes what the watcher can learn from the editor (the
//! focused document and the open workspace folders) and resolves it into the
//! file, language and project a heartbeat is tagged with.

pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use resolver::{ContextError, ContextResolver, ContextSnapshot};
pub use types::{ActiveDocument, EditorEventKind, EditorHost, EditorState, EditorUpdate};
