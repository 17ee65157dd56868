//! Sandbox API trait and error types.

use crate::types::{AnalysisState, ApiLimits, HistoryEntry, Report, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sp_core::Secret;
use thiserror::Error;

/// Errors that can occur when talking to the remote sandbox.
///
/// Everything the remote or the transport can do wrong surfaces here as
/// a value; nothing panics past this boundary.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Configuration for the sandbox connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base URL for the API, e.g. `https://api.any.run`.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum retries for idempotent requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.any.run".to_string(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// The remote sandbox analysis API.
///
/// Credentials are per-call because every bot user authenticates with
/// their own API key.
#[async_trait]
pub trait SandboxApi: Send + Sync {
    /// Submits a URL for detonation.
    async fn submit_url(&self, key: &Secret, url: &str, owner_id: i64)
        -> ConnectorResult<TaskId>;

    /// Submits file contents for detonation.
    async fn submit_file(
        &self,
        key: &Secret,
        bytes: Vec<u8>,
        filename: &str,
        owner_id: i64,
    ) -> ConnectorResult<TaskId>;

    /// Polls the current analysis state for a task.
    async fn get_status(&self, key: &Secret, task_id: &TaskId) -> ConnectorResult<AnalysisState>;

    /// Fetches the report for a completed task.
    async fn get_report(&self, key: &Secret, task_id: &TaskId) -> ConnectorResult<Report>;

    /// Lists past analyses for the key's account.
    async fn get_history(
        &self,
        key: &Secret,
        limit: u32,
        skip: u32,
    ) -> ConnectorResult<Vec<HistoryEntry>>;

    /// Fetches API quota limits for the key's account.
    async fn get_limits(&self, key: &Secret) -> ConnectorResult<ApiLimits>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.base_url, "https://api.any.run");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SandboxConfig =
            serde_json::from_str(r#"{"base_url": "https://sandbox.example"}"#).unwrap();
        assert_eq!(config.base_url, "https://sandbox.example");
        assert_eq!(config.timeout_secs, 60);
    }
}
