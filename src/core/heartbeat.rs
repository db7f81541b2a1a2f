//! Heartbeat records and the builder that assembles them.
//!
//! A heartbeat is an instant (zero duration) activity record. The event store
//! merges adjacent heartbeats with identical data into spans using the pulse
//! window passed alongside each submission.

use crate::context::{ContextError, ContextResolver, ContextSnapshot, EditorHost};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data attached to every heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatData {
    /// Workspace folder containing the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Language identifier of the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Absolute path of the document
    pub file: String,
}

/// A single activity record, in the event store's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// When the record was generated
    pub timestamp: DateTime<Utc>,
    /// Always zero
    pub duration: f64,
    pub data: HeartbeatData,
}

/// Builds heartbeat records from editor context.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatBuilder;

impl HeartbeatBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a record from an already resolved snapshot.
    pub fn build(&self, context: &ContextSnapshot, now: DateTime<Utc>) -> HeartbeatRecord {
        HeartbeatRecord {
            timestamp: now,
            duration: 0.0,
            data: HeartbeatData {
                project: Some(context.project_folder.to_string_lossy().to_string()),
                language: context.language.clone(),
                file: context.file_path.to_string_lossy().to_string(),
            },
        }
    }

    /// Resolve context and build a record, passing resolution errors through.
    pub fn build_from<H: EditorHost + ?Sized>(
        &self,
        resolver: &ContextResolver<'_, H>,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatRecord, ContextError> {
        let context = resolver.resolve()?;
        Ok(self.build(&context, now))
    }
}
