//! Error types for feed aggregation.
//!
//! Two of these categories are fatal to a whole aggregation call
//! (configuration and fetch failures); everything else in the pipeline
//! is absorbed locally as a skipped record or a degraded series and
//! never surfaces as an error.

use std::fmt;
use thiserror::Error;

/// The category of a feed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorCode {
    /// Missing or malformed source configuration; detected before any fetch.
    ConfigurationError,
    /// Upstream returned a non-success HTTP status.
    FetchFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Invalid response from the upstream - unexpected format.
    InvalidResponse,
    /// The caller-supplied deadline for the whole aggregation elapsed.
    DeadlineExceeded,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl FeedErrorCode {
    /// Returns true if a fresh attempt of the whole request may succeed.
    ///
    /// The core never retries; this classification is for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::NetworkError | Self::DeadlineExceeded
        )
    }

    /// Returns a stable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::FetchFailed => "fetch_failed",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for FeedErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while aggregating calendar feeds.
#[derive(Debug, Error)]
pub struct FeedError {
    /// The error code categorizing this error.
    code: FeedErrorCode,
    /// A human-readable message describing the error.
    message: String,
    /// The source URL involved, if any.
    url: Option<String>,
    /// The upstream HTTP status, for fetch failures.
    status: Option<u16>,
    /// The underlying cause of this error, if any.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FeedError {
    /// Creates a new feed error with the given code and message.
    pub fn new(code: FeedErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            url: None,
            status: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::ConfigurationError, message)
    }

    /// Creates a fetch error carrying the upstream HTTP status and URL.
    pub fn fetch(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            code: FeedErrorCode::FetchFailed,
            message: format!("fetch failed with status {}", status),
            status: Some(status),
            url: Some(url),
            source: None,
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::InvalidResponse, message)
    }

    /// Creates a deadline-exceeded error.
    pub fn deadline(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::DeadlineExceeded, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FeedErrorCode::InternalError, message)
    }

    /// Sets the source URL for this error.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the underlying cause for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> FeedErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the source URL, if set.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns the upstream HTTP status, if set.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if a fresh attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref url) = self.url {
            write!(f, "[{}] ", url)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
