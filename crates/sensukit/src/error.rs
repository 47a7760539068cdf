//! Error types for Sensu backend operations.
//!
//! Errors are categorized so callers can tell transient failures (worth a
//! retry on reads) from failures that need operator attention.

use std::fmt;
use thiserror::Error;

/// Result type for Sensu operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for retry logic and user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport-level failure (refused, timed out, DNS)
    Connection,
    /// Credentials rejected
    Authentication,
    /// Backend answered with an unexpected status
    Api,
    /// Requested object does not exist
    NotFound,
    /// `sensuctl` exited with a failure
    Command,
    /// Response body could not be understood
    Format,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Could not reach the Sensu backend",
            Self::Authentication => "Authentication failed",
            Self::Api => "Sensu API error",
            Self::NotFound => "Not found",
            Self::Command => "sensuctl command failed",
            Self::Format => "Unexpected response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Connection => "Check that the backend is running and the host/port are correct",
            Self::Authentication => "Verify the API username and password",
            Self::Api => "Check the request payload and the backend logs",
            Self::NotFound => "Verify the resource name and namespace",
            Self::Command => "Run the sensuctl command by hand to see the full output",
            Self::Format => "The backend may be a different version than expected",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a Sensu backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure before a status was received
    #[error("connection error: {message}")]
    Connection {
        /// Detailed error message from the transport
        message: String,
    },

    /// Login failed or the token was rejected twice
    #[error("authentication failed: {message}")]
    Authentication {
        /// What was rejected
        message: String,
    },

    /// Non-success status other than a read 404
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Object lookup failed
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing object
        what: String,
    },

    /// `sensuctl` exited non-zero
    #[error("sensuctl {args} failed: {stderr}")]
    Command {
        /// Arguments passed to sensuctl
        args: String,
        /// Standard error output
        stderr: String,
    },

    /// Body was not valid JSON or had the wrong shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::Api { .. } => ErrorCategory::Api,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Command { .. } => ErrorCategory::Command,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Io(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::Api {
                status,
                body: String::new(),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Connection {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
