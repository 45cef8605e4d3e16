//! Shared HTTP plumbing for the gateway clients.
//!
//! Maps `reqwest` failures onto [`RagError`] kinds and implements the one
//! retry policy the app uses: HTTP 429 and 5xx are retried with exponential
//! backoff (1s, 2s, 4s, ... capped at 32s); connection failures, timeouts,
//! and other statuses are returned immediately.

use std::time::Duration;

use mishkat_core::RagError;

const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_client(service: &'static str, timeout: Option<Duration>) -> Result<reqwest::Client, RagError> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(10));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| RagError::connection(service, format!("failed to build HTTP client: {}", e)))
}

/// Classify a transport-level failure.
pub fn map_send_error(service: &'static str, timeout: Duration, e: reqwest::Error) -> RagError {
    if e.is_timeout() {
        RagError::TimedOut {
            service,
            after: timeout,
        }
    } else if e.is_connect() || e.is_request() {
        RagError::connection(service, e.to_string())
    } else if e.is_decode() || e.is_body() {
        RagError::service(service, e.status().map(|s| s.as_u16()), e.to_string())
    } else {
        RagError::connection(service, e.to_string())
    }
}

/// Classify a non-success HTTP status.
pub fn error_from_status(service: &'static str, status: reqwest::StatusCode, body: &str) -> RagError {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status.as_u16() {
        401 | 403 => RagError::connection(service, format!("unauthorized (HTTP {}): {}", status.as_u16(), body)),
        code => RagError::service(service, Some(code), body),
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// Send a request, retrying 429/5xx responses up to `max_retries` times.
///
/// `make` must build a fresh request for every attempt. Returns the first
/// successful response.
pub async fn send_with_retry<F>(
    service: &'static str,
    timeout: Duration,
    max_retries: u32,
    make: F,
) -> Result<reqwest::Response, RagError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::debug!(service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let response = make()
            .send()
            .await
            .map_err(|e| map_send_error(service, timeout, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = error_from_status(service, status, &body);
        if !is_retryable(status) {
            return Err(err);
        }
        tracing::warn!(service, status = status.as_u16(), "transient service error");
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| RagError::service(service, None, "request failed after retries")))
}

/// Decode a JSON body, mapping failures to a service error.
pub async fn read_json(service: &'static str, response: reqwest::Response) -> Result<serde_json::Value, RagError> {
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| RagError::service(service, Some(status), format!("invalid JSON response: {}", e)))
}
