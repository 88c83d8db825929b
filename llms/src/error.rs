//! Error types for the llms crate.
//!
//! Vendor failures are carried in [`LlmError`] exactly as the vendor reported
//! them (status, message, code). Nothing here retries; [`LlmError::is_retryable`]
//! only classifies errors for callers that run their own retry policy.

use std::fmt;

/// Result type alias for llms operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type of the crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Vendor or transport failure.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The approximation tokenizer could not be loaded.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// No provider is registered under this name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// No registered provider serves this model.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a tokenizer error.
    #[must_use]
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Returns the vendor error, if this is one.
    #[must_use]
    pub const fn as_llm(&self) -> Option<&LlmError> {
        match self {
            Self::Llm(err) => Some(err),
            _ => None,
        }
    }
}

/// Error reported by (or while talking to) an LLM vendor.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// Provider name (e.g., "reka", "openai").
    pub provider: Option<String>,
    /// Message as reported by the vendor or transport.
    pub message: String,
    /// Vendor error code or HTTP status, when known.
    pub code: Option<String>,
}

/// Categories of vendor errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// The vendor rejected the request parameters.
    InvalidRequest,
    /// The vendor response did not have the expected shape.
    ResponseFormat,
    /// Network or connection error.
    Network,
    /// Error while reading a streamed response.
    Stream,
    /// Non-success HTTP status with an unrecognized body.
    HttpStatus,
    /// Vendor-specific error.
    Provider,
    /// Internal error (client construction and the like).
    Internal,
}

impl LlmError {
    fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            message: message.into(),
            code: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message).with_provider(provider)
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimited, message).with_provider(provider)
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message).with_provider(provider)
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::new(
            LlmErrorKind::ResponseFormat,
            format!("Expected {}, got {}", expected.into(), got.into()),
        )
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    /// Create a streaming error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Stream, message)
    }

    /// Create an HTTP status error carrying the raw response body.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            code: Some(status.to_string()),
            ..Self::new(LlmErrorKind::HttpStatus, format!("HTTP {status}: {}", body.into()))
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Provider, message).with_provider(provider)
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Internal, message)
    }

    /// Attach the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach a vendor error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Map a vendor HTTP status and error message to an error kind.
    ///
    /// 401/403 are authentication failures, 429 is rate limiting, 400/404/422
    /// are rejected requests and everything else is a provider error.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        let err = match status {
            401 | 403 => Self::auth(provider, message),
            429 => Self::rate_limited(provider, message),
            400 | 404 | 422 => Self::invalid_request(provider, message),
            _ => Self::provider(provider, message),
        };
        err.with_code(status.to_string())
    }

    /// Check if this error is worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, LlmErrorKind::RateLimited | LlmErrorKind::Network)
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::response_format("JSON response body", err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    mod error {
        use super::*;

        #[test]
        fn from_llm_error() {
            let err: Error = LlmError::network("timeout").into();
            assert!(matches!(err, Error::Llm(_)));
            assert!(err.as_llm().is_some());
        }

        #[test]
        fn from_json_error() {
            let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
            assert!(err.as_llm().is_none());
        }

        #[test]
        fn unknown_model_mentions_name() {
            let err = Error::UnknownModel("gpt-9".into());
            assert!(err.to_string().contains("gpt-9"));
        }
    }

    mod llm_error {
        use super::*;

        #[test]
        fn display_includes_provider_and_code() {
            let err = LlmError::provider("reka", "model overloaded").with_code("503");
            assert_eq!(err.to_string(), "[reka] model overloaded (code: 503)");
        }

        #[test]
        fn display_without_provider() {
            let err = LlmError::stream("connection reset");
            assert_eq!(err.to_string(), "connection reset");
        }

        #[test]
        fn http_status_keeps_body() {
            let err = LlmError::http_status(502, "<html>bad gateway</html>");
            assert_eq!(err.kind, LlmErrorKind::HttpStatus);
            assert_eq!(err.code.as_deref(), Some("502"));
            assert!(err.message.contains("bad gateway"));
        }

        #[test]
        fn from_status_classifies() {
            assert_eq!(LlmError::from_status("x", 401, "m").kind, LlmErrorKind::Auth);
            assert_eq!(LlmError::from_status("x", 403, "m").kind, LlmErrorKind::Auth);
            assert_eq!(
                LlmError::from_status("x", 429, "m").kind,
                LlmErrorKind::RateLimited
            );
            assert_eq!(
                LlmError::from_status("x", 422, "m").kind,
                LlmErrorKind::InvalidRequest
            );
            assert_eq!(LlmError::from_status("x", 500, "m").kind, LlmErrorKind::Provider);
        }

        #[test]
        fn retryable_kinds() {
            assert!(LlmError::rate_limited("openai", "slow down").is_retryable());
            assert!(LlmError::network("reset").is_retryable());
            assert!(!LlmError::auth("openai", "bad key").is_retryable());
            assert!(!LlmError::internal("oops").is_retryable());
        }
    }
}
