//! Unified error type for the composition engine
//!
//! Every invocation ends in either a produced value/sequence or an error from
//! this taxonomy (or an unmodified leaf error when no fault-handling
//! decorator intercepts it). Sequential, Parallel, and plain decorators are
//! transparent conduits; only retry and fallback policies convert errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The unified error type for the Headwater engine.
#[derive(Error, Debug)]
pub enum Error {
    /// A pipeline was assembled from invalid parts (too few steps,
    /// duplicate branch names).
    #[error("construction error: {message}")]
    Construction { message: String },

    /// Input could not be coerced into the shape a module expects.
    #[error("coercion error: {message}")]
    Coercion {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An effect was driven more than once.
    #[error("effect already consumed")]
    Consumption,

    /// A scalar resolve drained a sequence effect that produced no elements.
    #[error("effect produced no elements")]
    Exhausted,

    /// The retry budget ran out; wraps the last observed failure.
    #[error("retry exhausted after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Engine bookkeeping reached a state that should be unreachable.
    #[error("internal invariant violated: {message}")]
    Internal { message: String },

    /// A value failed a structural check (e.g. a missing key).
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The private blocking scheduler could not be constructed.
    #[error("scheduler error: {message}")]
    Scheduler { message: String },

    /// A leaf module failed with an application-level error.
    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }

    /// Create a coercion error.
    pub fn coercion(message: impl Into<String>) -> Self {
        Self::Coercion {
            message: message.into(),
            source: None,
        }
    }

    /// Create a coercion error wrapping an underlying cause.
    pub fn coercion_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Coercion {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal-invariant error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a validation error for a specific field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a generic leaf error from a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            source: None,
        }
    }

    /// True when the error marks an already-consumed effect.
    pub fn is_consumption(&self) -> bool {
        matches!(self, Self::Consumption)
    }

    /// True when the error marks an empty sequence drained for a scalar.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Coercion {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Error patterns selecting which failures a fault-handling policy reacts to.
///
/// Matching is performed against the error's display string, so leaf modules
/// do not need to share an error vocabulary with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMatcher {
    /// Network-related errors
    Network,
    /// Timeout errors
    Timeout,
    /// HTTP 5xx errors
    ServerError,
    /// Rate limiting errors
    RateLimit,
    /// Custom regex pattern
    Pattern(String),
}

impl ErrorMatcher {
    /// Check if an error matches this matcher.
    pub fn matches(&self, error: &Error) -> bool {
        let error_msg = error.to_string();
        let error_lower = error_msg.to_lowercase();
        match self {
            ErrorMatcher::Network => {
                error_lower.contains("network")
                    || error_lower.contains("connection")
                    || error_lower.contains("refused")
                    || error_lower.contains("unreachable")
            }
            ErrorMatcher::Timeout => {
                error_lower.contains("timeout") || error_lower.contains("timed out")
            }
            ErrorMatcher::ServerError => {
                error_lower.contains("500")
                    || error_lower.contains("502")
                    || error_lower.contains("503")
                    || error_lower.contains("504")
                    || error_lower.contains("server error")
            }
            ErrorMatcher::RateLimit => {
                error_lower.contains("rate limit")
                    || error_lower.contains("429")
                    || error_lower.contains("too many requests")
            }
            ErrorMatcher::Pattern(pattern) => {
                if let Ok(re) = regex::Regex::new(pattern) {
                    re.is_match(&error_msg)
                } else {
                    false
                }
            }
        }
    }

    /// Check an error against a matcher list; an empty list matches all.
    pub fn any_match(matchers: &[ErrorMatcher], error: &Error) -> bool {
        if matchers.is_empty() {
            return true;
        }
        matchers.iter().any(|m| m.matches(error))
    }
}
