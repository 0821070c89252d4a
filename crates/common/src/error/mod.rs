//! Error classification shared by every Unigate error type
//!
//! Module errors stay concrete `thiserror` enums. This module only provides
//! the traits that let the retry and logging layers reason about them
//! uniformly:
//!
//! - [`ErrorClassification`]: retryability, severity and retry hints
//! - [`HasKind`]: mapping onto the shared [`ErrorKind`] taxonomy
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use unigate_common::error::{ErrorClassification, ErrorSeverity, HasKind};
//! use unigate_domain::ErrorKind;
//!
//! #[derive(Debug)]
//! struct Flaky;
//!
//! impl ErrorClassification for Flaky {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         Some(Duration::from_millis(250))
//!     }
//! }
//!
//! impl HasKind for Flaky {
//!     fn kind(&self) -> ErrorKind {
//!         ErrorKind::RetryableTransport
//!     }
//! }
//!
//! assert!(Flaky.is_retryable());
//! assert!(!Flaky.is_critical());
//! ```

use std::fmt;
use std::time::Duration;

pub use unigate_domain::ErrorKind;

/// Trait for classifying errors by retryability and severity
///
/// Implemented by every error enum in the workspace so generic code (retry
/// policies, log helpers) can decide what to do without matching on
/// concrete variants.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: timeouts, connection resets,
    /// throttling, temporary server-side failures.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the failure carries a concrete hint
    /// (e.g. a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Maps an error value onto the shared [`ErrorKind`] taxonomy
pub trait HasKind {
    /// Error kind for programmatic matching
    fn kind(&self) -> ErrorKind;
}

impl HasKind for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

impl HasKind for unigate_domain::ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl ErrorSeverity {
    /// Default severity for an error kind
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::RetryableTransport | ErrorKind::RetryableHttp | ErrorKind::ReauthRequired => {
                Self::Warning
            }
            ErrorKind::Cancelled | ErrorKind::CircuitOpen => Self::Info,
            ErrorKind::InsecureTlsRejected | ErrorKind::UnsafePath => Self::Critical,
            _ => Self::Error,
        }
    }
}
