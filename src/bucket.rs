//! Bucket identity for this watcher.
//!
//! Every call to the event store is keyed by a single bucket id derived from
//! the client name and the local host name.

use serde::Serialize;

/// Client name registered with the event store.
pub const CLIENT_NAME: &str = "aw-watcher-vscode";

/// Event type of the bucket.
pub const EVENT_TYPE: &str = "app.editor.activity";

/// Identity of the bucket heartbeats are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketIdentity {
    id: String,
    host_name: String,
    client_name: String,
    event_type: String,
}

impl BucketIdentity {
    /// Create an identity for the given client and host.
    pub fn new(client_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        let client_name = client_name.into();
        let host_name = host_name.into();
        Self {
            id: format!("{client_name}_{host_name}"),
            host_name,
            client_name,
            event_type: EVENT_TYPE.to_string(),
        }
    }

    /// Create the identity for this machine, resolving the host name once.
    pub fn detect() -> Self {
        let host_name = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|e| {
                tracing::warn!("Could not resolve host name: {e}");
                "unknown".to_string()
            });
        Self::new(CLIENT_NAME, host_name)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_id_format() {
        let identity = BucketIdentity::new(CLIENT_NAME, "workstation");
        assert_eq!(identity.id(), "aw-watcher-vscode_workstation");
        assert_eq!(identity.host_name(), "workstation");
        assert_eq!(identity.event_type(), "app.editor.activity");
    }

    #[test]
    fn test_detect_is_stable() {
        let first = BucketIdentity::detect();
        let second = BucketIdentity::detect();
        assert_eq!(first.id(), second.id());
        assert!(first.id().starts_with("aw-watcher-vscode_"));
    }
}
