//! Error types for the webhook core
//!
//! Configuration loading and the binary use `anyhow`; everything that talks to
//! Cloud DNS or handles endpoints returns [`Error`].

use std::fmt;

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any network call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No zone matches a name
    #[error("no matching domain found for {0}")]
    NotFound(String),

    /// Identity call failed or returned an unusable session
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A Cloud DNS call failed
    #[error("{context}: {message}")]
    Provider {
        /// What was being attempted (names the zone or record)
        context: String,
        /// Underlying failure
        message: String,
    },

    /// One or more records failed while applying a change-set
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a provider error
    pub fn provider(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Provider {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Wrap this error with the zone or record it happened on.
    ///
    /// Input, lookup and authentication errors keep their kind; provider
    /// errors gain an outer context.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Provider { .. } => Self::Provider {
                context: context.into(),
                message: self.to_string(),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::provider("HTTP request failed", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::provider("failed to parse response", err)
    }
}

//==============================================================================
// Aggregation
//==============================================================================

/// Which change a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed change
#[derive(Debug)]
pub struct RecordFailure {
    pub operation: Operation,
    pub dns_name: String,
    pub error: Error,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to {} record {}: {}",
            self.operation, self.dns_name, self.error
        )
    }
}

/// Failures collected over a whole change-set
///
/// Built with [`AggregateError::push`] while every change is attempted, then
/// turned into a result with [`AggregateError::into_result`].
#[derive(Debug, Default)]
pub struct AggregateError {
    failures: Vec<RecordFailure>,
}

impl AggregateError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation, dns_name: impl Into<String>, error: Error) {
        self.failures.push(RecordFailure {
            operation,
            dns_name: dns_name.into(),
            error,
        });
    }

    pub fn failures(&self) -> &[RecordFailure] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Names of every failed record, in the order they failed
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.dns_name.as_str()).collect()
    }

    /// `Ok(())` when nothing failed
    pub fn into_result(self) -> std::result::Result<(), AggregateError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} record change(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

//==============================================================================
// Tests
//==============================================================================
