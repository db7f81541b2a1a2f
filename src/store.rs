//! Client for the ActivityWatch event store.
//!
//! The watcher only needs two calls: make sure its bucket exists, and submit
//! heartbeats into it. [`EventStore`] is the seam the controller depends on;
//! [`AwClient`] implements it against the aw-server REST API.

use crate::bucket::BucketIdentity;
use crate::core::HeartbeatRecord;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Pulse window, in seconds, sent with every heartbeat.
pub const PULSE_WINDOW_SECS: u64 = 20;

/// Default aw-server port.
pub const DEFAULT_PORT: u16 = 5600;

/// Port aw-server listens on in testing mode.
pub const TESTING_PORT: u16 = 5666;

/// Event store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Server host (default: 127.0.0.1)
    pub host: String,
    /// Server port, overrides the testing-mode default when set
    pub port: Option<u16>,
    /// Talk to a server running in testing mode
    pub testing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            testing: false,
        }
    }
}

impl StoreConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            testing: false,
        }
    }

    /// The port actually used.
    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None if self.testing => TESTING_PORT,
            None => DEFAULT_PORT,
        }
    }

    /// Get the base API URL.
    pub fn api_url(&self) -> String {
        format!("http://{}:{}/api/0", self.host, self.effective_port())
    }

    pub fn info_url(&self) -> String {
        format!("{}/info", self.api_url())
    }

    /// URL of a bucket. The id is percent-encoded as a single path segment.
    pub fn bucket_url(&self, bucket_id: &str) -> Result<Url, StoreError> {
        self.bucket_endpoint(bucket_id, &[])
    }

    pub fn heartbeat_url(
        &self,
        bucket_id: &str,
        pulse_window_secs: u64,
    ) -> Result<Url, StoreError> {
        let mut url = self.bucket_endpoint(bucket_id, &["heartbeat"])?;
        url.query_pairs_mut()
            .append_pair("pulsetime", &pulse_window_secs.to_string());
        Ok(url)
    }

    fn bucket_endpoint(&self, bucket_id: &str, tail: &[&str]) -> Result<Url, StoreError> {
        let base = self.api_url();
        let mut url =
            Url::parse(&base).map_err(|e| StoreError::Client(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Client(format!("{base} cannot be a base URL")))?
            .push("buckets")
            .push(bucket_id)
            .extend(tail);
        Ok(url)
    }
}

/// Event store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The HTTP client could not be built
    #[error("event store client error: {0}")]
    Client(String),
    /// Network/HTTP error
    #[error("event store network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("event store server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Operations the watcher needs from the event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create the bucket, succeeding if it already exists.
    async fn create_bucket(&self, bucket: &BucketIdentity) -> Result<(), StoreError>;

    /// Submit one heartbeat.
    async fn heartbeat(
        &self,
        bucket_id: &str,
        pulse_window_secs: u64,
        record: &HeartbeatRecord,
    ) -> Result<(), StoreError>;
}

/// Body of a bucket creation request.
#[derive(Debug, Serialize)]
struct CreateBucketRequest<'a> {
    client: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    hostname: &'a str,
}

/// Server information returned by `/api/0/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub version: String,
    #[serde(default)]
    pub testing: bool,
}

/// aw-server REST client.
pub struct AwClient {
    config: StoreConfig,
    client: reqwest::Client,
}

impl AwClient {
    /// Create a new client.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Probe the server.
    pub async fn server_info(&self) -> Result<ServerInfo, StoreError> {
        let response = self
            .client
            .get(self.config.info_url())
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let response = check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }
}

#[async_trait]
impl EventStore for AwClient {
    async fn create_bucket(&self, bucket: &BucketIdentity) -> Result<(), StoreError> {
        let body = CreateBucketRequest {
            client: bucket.client_name(),
            event_type: bucket.event_type(),
            hostname: bucket.host_name(),
        };

        let response = self
            .client
            .post(self.config.bucket_url(bucket.id())?)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        // aw-server answers 304 when the bucket already exists.
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn heartbeat(
        &self,
        bucket_id: &str,
        pulse_window_secs: u64,
        record: &HeartbeatRecord,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.config.heartbeat_url(bucket_id, pulse_window_secs)?)
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(StoreError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_urls() {
        let config = StoreConfig::new("127.0.0.1", 5600);
        assert_eq!(config.api_url(), "http://127.0.0.1:5600/api/0");
        assert_eq!(
            config.bucket_url("aw-watcher-vscode_box").unwrap().as_str(),
            "http://127.0.0.1:5600/api/0/buckets/aw-watcher-vscode_box"
        );
        assert_eq!(
            config.heartbeat_url("b", PULSE_WINDOW_SECS).unwrap().as_str(),
            "http://127.0.0.1:5600/api/0/buckets/b/heartbeat?pulsetime=20"
        );
    }

    #[test]
    fn test_bucket_id_is_one_path_segment() {
        let config = StoreConfig::new("127.0.0.1", 5600);
        let url = config
            .heartbeat_url("aw-watcher-vscode_lab/box?x#1", PULSE_WINDOW_SECS)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:5600/api/0/buckets/aw-watcher-vscode_lab%2Fbox%3Fx%231/heartbeat?pulsetime=20"
        );
        assert_eq!(url.query(), Some("pulsetime=20"));
    }

    #[test]
    fn test_testing_mode_port() {
        let mut config = StoreConfig::default();
        assert_eq!(config.effective_port(), DEFAULT_PORT);

        config.testing = true;
        assert_eq!(config.effective_port(), TESTING_PORT);

        config.port = Some(7000);
        assert_eq!(config.effective_port(), 7000);
    }

    #[test]
    fn test_create_bucket_body() {
        let bucket = BucketIdentity::new("aw-watcher-vscode", "box");
        let body = CreateBucketRequest {
            client: bucket.client_name(),
            event_type: bucket.event_type(),
            hostname: bucket.host_name(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "app.editor.activity");
        assert_eq!(json["hostname"], "box");
    }
}
