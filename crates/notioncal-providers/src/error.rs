//! Errors from the upstream record store.
//!
//! Messages are safe to log: they never carry the API token or the raw
//! upstream response body.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The category of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamErrorCode {
    /// 401: the token is invalid or revoked.
    AuthenticationFailed,
    /// 403: the integration cannot see the database.
    AuthorizationFailed,
    /// Connection failure, DNS, timeout.
    NetworkError,
    /// 429: too many requests.
    RateLimited,
    /// 5xx status codes.
    ServerError,
    /// The body could not be decoded.
    InvalidResponse,
    /// 404: unknown database.
    NotFound,
    /// 400: malformed query, usually a bad filter or property name.
    BadRequest,
    /// The client itself could not be built.
    ConfigurationError,
}

impl UpstreamErrorCode {
    /// Returns true if the same request may be issued again.
    ///
    /// Only rate limiting qualifies; every other failure is surfaced to the
    /// caller on first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for UpstreamErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request to the record store.
#[derive(Debug, Error)]
pub struct UpstreamError {
    code: UpstreamErrorCode,
    message: String,
    /// Server-requested wait before retrying, from `Retry-After`.
    retry_after: Option<Duration>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl UpstreamError {
    pub fn new(code: UpstreamErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorCode::ConfigurationError, message)
    }

    /// Sets the server-requested retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> UpstreamErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limiting_is_retryable() {
        assert!(UpstreamErrorCode::RateLimited.is_retryable());
        for code in [
            UpstreamErrorCode::AuthenticationFailed,
            UpstreamErrorCode::AuthorizationFailed,
            UpstreamErrorCode::NetworkError,
            UpstreamErrorCode::ServerError,
            UpstreamErrorCode::InvalidResponse,
            UpstreamErrorCode::NotFound,
            UpstreamErrorCode::BadRequest,
        ] {
            assert!(!code.is_retryable(), "{code} should not be retryable");
        }
    }

    #[test]
    fn display_includes_code() {
        let err = UpstreamError::not_found("database not found");
        assert_eq!(err.to_string(), "not_found: database not found");
    }

    #[test]
    fn retry_after_is_carried() {
        let err = UpstreamError::rate_limited("slow down").with_retry_after(Duration::from_secs(2));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(err.is_retryable());
    }

    #[test]
    fn source_is_kept() {
        use std::error::Error;
        let err = UpstreamError::network("connection failed")
            .with_source(std::io::Error::other("reset"));
        assert!(err.source().is_some());
    }
}
