//! Provider construction errors and HTTP failure classification.

use reqwest::StatusCode;
use thiserror::Error;
use vocalis_abstraction::{ServiceError, StoreError};

/// Errors raised while setting up a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid connection string: {0}")]
    ConnectionString(String),

    #[error("unsupported storage authentication: {0}")]
    UnsupportedAuth(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for StoreError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::ConnectionString(_) | ProviderError::UnsupportedAuth(_) => {
                StoreError::Configuration(e.to_string())
            }
            ProviderError::Client(_) | ProviderError::Io(_) => StoreError::Other(e.to_string()),
        }
    }
}

/// Maps a non-success storage response.
///
/// 408, 429 and 5xx are retryable; 401/403 and 404 have their own variants;
/// any other status is a rejection.
pub(crate) fn store_status_error(status: StatusCode, body: &str, operation: &str) -> StoreError {
    let message = format!("{operation}: {}", summarize_body(body));
    match status.as_u16() {
        429 => StoreError::Throttled(message),
        408 | 500..=599 => StoreError::Transient(format!("{operation} ({status}): {}", summarize_body(body))),
        401 | 403 => StoreError::PermissionDenied(message),
        404 => StoreError::NotFound(message),
        code => StoreError::Rejected { status: code, message },
    }
}

pub(crate) fn service_status_error(status: StatusCode, body: &str, operation: &str) -> ServiceError {
    let message = format!("{operation}: {}", summarize_body(body));
    match status.as_u16() {
        429 => ServiceError::Throttled(message),
        408 | 500..=599 => ServiceError::Transient(format!("{operation} ({status}): {}", summarize_body(body))),
        401 | 403 => ServiceError::PermissionDenied(message),
        404 => ServiceError::NotFound(message),
        code => ServiceError::Rejected { status: code, message },
    }
}

/// Connection failures and timeouts are retryable; anything else is not.
pub(crate) fn store_transport_error(e: &reqwest::Error, operation: &str) -> StoreError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        StoreError::Transient(format!("{operation}: {e}"))
    } else {
        StoreError::Other(format!("{operation}: {e}"))
    }
}

pub(crate) fn service_transport_error(e: &reqwest::Error, operation: &str) -> ServiceError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        ServiceError::Transient(format!("{operation}: {e}"))
    } else {
        ServiceError::Other(format!("{operation}: {e}"))
    }
}

/// Keeps error bodies short enough for a log line.
fn summarize_body(body: &str) -> String {
    const MAX: usize = 300;
    let body = body.trim();
    if body.is_empty() {
        return "no details".to_string();
    }
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
