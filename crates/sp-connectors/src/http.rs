//! HTTP utilities for the sandbox connector.
//!
//! A thin wrapper over reqwest: base-URL joining, `API-Key` header
//! authentication, timeout classification, and bounded retries for
//! idempotent requests. Multipart submissions are sent once because
//! their payloads cannot be cloned for a retry.

use crate::traits::{ConnectorError, ConnectorResult, SandboxConfig};
use reqwest::multipart::Form;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use sp_core::Secret;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP client bound to one sandbox base URL.
pub struct HttpClient {
    client: Client,
    config: SandboxConfig,
}

impl HttpClient {
    /// Creates a new client from connector configuration.
    pub fn new(config: SandboxConfig) -> ConnectorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Executes a GET request with retry logic.
    pub async fn get(&self, path: &str, key: &Secret) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path));
        self.execute_with_retry(self.authorize(request, key)).await
    }

    /// Executes a GET request with query parameters and retry logic.
    pub async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        key: &Secret,
        query: &Q,
    ) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path)).query(query);
        self.execute_with_retry(self.authorize(request, key)).await
    }

    /// Opens a streaming GET, advertising event-stream acceptance.
    ///
    /// The caller consumes the body incrementally; no retry, since a
    /// half-read stream cannot be resumed transparently.
    pub async fn get_event_stream(&self, path: &str, key: &Secret) -> ConnectorResult<Response> {
        let request = self
            .client
            .get(self.build_url(path))
            .header("Accept", "text/event-stream");
        self.execute_once(self.authorize(request, key)).await
    }

    /// Executes a JSON POST request once.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        key: &Secret,
        body: &T,
    ) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).json(body);
        self.execute_once(self.authorize(request, key)).await
    }

    /// Executes a multipart/form-data POST request once.
    pub async fn post_multipart(
        &self,
        path: &str,
        key: &Secret,
        form: Form,
    ) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        self.execute_once(self.authorize(request, key)).await
    }

    fn authorize(&self, request: reqwest::RequestBuilder, key: &Secret) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("API-Key {}", key.expose()))
    }

    /// Sends a request once, classifying transport failures.
    async fn execute_once(&self, request: reqwest::RequestBuilder) -> ConnectorResult<Response> {
        let response = request.send().await.map_err(classify_transport_error)?;
        check_auth_status(&response)?;
        Ok(response)
    }

    /// Sends a request, retrying on transport failures and server errors
    /// with exponential backoff.
    async fn execute_with_retry(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<Response> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(200);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(attempt, ?delay, "retrying sandbox request");
                sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(10));
            }

            let request_clone = request.try_clone().ok_or_else(|| {
                ConnectorError::InvalidRequest("request body is not retryable".to_string())
            })?;

            match request_clone.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.config.max_retries {
                        warn!(%status, "server error from sandbox, retrying");
                        last_error = Some(ConnectorError::RequestFailed(format!(
                            "Server error: {}",
                            status
                        )));
                        continue;
                    }
                    check_auth_status(&response)?;
                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(classify_transport_error(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ConnectorError::RequestFailed("unknown error".to_string())))
    }
}

/// Maps authentication/authorization status codes to typed errors; all
/// other statuses are left for the caller to interpret.
fn check_auth_status(response: &Response) -> ConnectorResult<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(ConnectorError::AuthenticationFailed(
            "wrong authorization data".to_string(),
        )),
        _ => Ok(()),
    }
}

fn classify_transport_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

/// Extracts a human-readable error message from a non-2xx response body.
///
/// The remote usually sends `{"message": "..."}`; anything else is
/// passed through truncated.
pub async fn remote_error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }

    let snippet: String = body.chars().take(200).collect();
    if snippet.is_empty() {
        format!("HTTP {}", status)
    } else {
        snippet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HttpClient {
        HttpClient::new(SandboxConfig {
            base_url: "https://api.example.com".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        })
        .unwrap()
    }

    #[test]
    fn build_url_joins_paths() {
        let client = test_client();
        assert_eq!(
            client.build_url("/v1/analysis"),
            "https://api.example.com/v1/analysis"
        );
        assert_eq!(
            client.build_url("v1/analysis"),
            "https://api.example.com/v1/analysis"
        );
    }

    #[test]
    fn build_url_tolerates_trailing_slash() {
        let client = HttpClient::new(SandboxConfig {
            base_url: "https://api.example.com/".to_string(),
            ..SandboxConfig::default()
        })
        .unwrap();
        assert_eq!(client.build_url("/v1/user"), "https://api.example.com/v1/user");
    }
}
