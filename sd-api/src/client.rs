//! HTTP client for the live-room REST API.
//!
//! Handles bearer authentication, timeouts, retry of idempotent reads, and
//! the request/response lifecycle. Every public request method returns the
//! already-unwrapped payload.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use sd_core::config::ServerConfig;
use sd_core::error::{SdError, SdResult};

use crate::response::{error_message, unwrap_payload};

/// Retry configuration for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

/// HTTP client for the live-room server.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://example.com/api").
    api_root: String,
    /// Bearer credential, if signed in.
    token: Option<String>,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> SdResult<Self> {
        if config.address.trim().is_empty() {
            return Err(SdError::MissingConfig("server address".into()));
        }

        let timeout = config.api_timeout();
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SdError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            api_root: config.api_root(),
            token: None,
            timeout,
            retry_config: RetryConfig::default(),
        })
    }

    /// Attach a bearer credential to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.is_empty());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.api_root)
        } else {
            format!("{}/{path}", self.api_root)
        }
    }

    fn build_request(&self, method: Method, url: &str, body: Option<&Value>) -> RequestBuilder {
        let mut builder = self
            .inner
            .request(method, url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
    }

    /// Execute a request. GETs are retried with exponential backoff.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SdResult<Response> {
        let url = self.url(path);
        let max_retries = if method == Method::GET {
            self.retry_config.max_retries
        } else {
            0
        };
        debug!("{} {}", method, path);

        let mut last_error: Option<SdError> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, body).query(query);

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(SdError::ServerError {
                            status: status.as_u16(),
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SdError::Http("max retries exceeded".into())))
    }

    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_config.base_delay.as_millis() as u64;
        let delay_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        let max_ms = self.retry_config.max_delay.as_millis() as u64;
        Duration::from_millis(delay_ms.min(max_ms))
    }

    // --- Public HTTP methods ---

    /// GET and unwrap the payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdResult<T> {
        self.get_with_query(path, &[]).await
    }

    /// GET with query parameters and unwrap the payload.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> SdResult<T> {
        let response = self.execute(Method::GET, path, query, None).await?;
        Self::parse_payload(response).await
    }

    /// POST a JSON body and unwrap the payload.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdResult<T> {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::POST, path, &[], Some(&body)).await?;
        Self::parse_payload(response).await
    }

    /// POST without a body and unwrap the payload.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> SdResult<T> {
        let response = self.execute(Method::POST, path, &[], None).await?;
        Self::parse_payload(response).await
    }

    /// PUT a JSON body and unwrap the payload.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> SdResult<T> {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::PUT, path, &[], Some(&body)).await?;
        Self::parse_payload(response).await
    }

    /// DELETE and unwrap the payload.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> SdResult<T> {
        let response = self.execute(Method::DELETE, path, &[], None).await?;
        Self::parse_payload(response).await
    }

    // --- Response helpers ---

    /// Read the body, normalize the envelope, and deserialize the payload.
    async fn parse_payload<T: DeserializeOwned>(response: Response) -> SdResult<T> {
        let text = response
            .text()
            .await
            .map_err(|e| SdError::Http(format!("failed to read response body: {e}")))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| SdError::Serialization(format!("failed to parse response: {e}")))?
        };
        let payload = unwrap_payload(body)?;
        serde_json::from_value(payload)
            .map_err(|e| SdError::Serialization(format!("unexpected payload: {e}")))
    }

    /// Convert error statuses into SdError.
    async fn check_status(response: Response) -> SdResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::status_error(status, &body))
    }

    fn status_error(status: StatusCode, body: &str) -> SdError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| format!("request failed ({})", status.as_u16()));

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            SdError::AuthFailed(message)
        } else {
            SdError::ServerError {
                status: status.as_u16(),
                message,
            }
        }
    }

    fn classify_error(e: reqwest::Error) -> SdError {
        if e.is_timeout() {
            SdError::Timeout(e.to_string())
        } else if e.is_connect() {
            SdError::Http(format!("connection failed: {e}"))
        } else {
            SdError::Http(e.to_string())
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_root", &self.api_root)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(address: &str) -> ServerConfig {
        ServerConfig {
            address: address.into(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_url_building() {
        let client = ApiClient::new(&server("https://live.example.com")).unwrap();
        assert_eq!(client.api_root(), "https://live.example.com/api");
        assert_eq!(
            client.url("/live-rooms/r1"),
            "https://live.example.com/api/live-rooms/r1"
        );
        assert_eq!(client.url("live-rooms"), "https://live.example.com/api/live-rooms");
    }

    #[test]
    fn test_requires_address() {
        assert!(matches!(
            ApiClient::new(&server("  ")),
            Err(SdError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_token_handling() {
        let client = ApiClient::new(&server("http://localhost:8080")).unwrap();
        assert!(!client.has_token());

        let mut client = client.with_token("abc");
        assert!(client.has_token());
        client.set_token(Some(String::new()));
        assert!(!client.has_token());
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let client = ApiClient::new(&server("http://localhost:8080")).unwrap();
        assert_eq!(client.calculate_retry_delay(0), Duration::from_millis(500));
        assert_eq!(client.calculate_retry_delay(1), Duration::from_secs(1));
        assert_eq!(client.calculate_retry_delay(10), Duration::from_secs(4));
    }

    #[test]
    fn test_status_error_mapping() {
        let err = ApiClient::status_error(StatusCode::UNAUTHORIZED, r#"{"error":"未登入"}"#);
        assert!(matches!(err, SdError::AuthFailed(ref m) if m == "未登入"));

        let err = ApiClient::status_error(
            StatusCode::NOT_FOUND,
            r#"{"error":"not found","details":"record not found"}"#,
        );
        assert!(matches!(
            err,
            SdError::ServerError { status: 404, ref message } if message == "not found: record not found"
        ));

        let err = ApiClient::status_error(StatusCode::BAD_GATEWAY, "<html>");
        assert!(matches!(
            err,
            SdError::ServerError { status: 502, ref message } if message == "request failed (502)"
        ));
    }
}
