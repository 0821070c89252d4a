//! Generic building blocks shared across Unigate crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification, request validation
//! - `runtime`: async resilience (circuit breaker, backoff, request context)
//! - `platform`: secret handling (secure credential, OS keychain)
//! - `observability`: tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod validation;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorKind, ErrorSeverity, HasKind};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffConfig, BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    RequestContext, ResilienceError, RetryError,
};
#[cfg(feature = "platform")]
pub use security::{KeychainProvider, SecureCredential};
#[cfg(feature = "foundation")]
pub use validation::{EndpointValidationError, EndpointValidator, PathValidator};
