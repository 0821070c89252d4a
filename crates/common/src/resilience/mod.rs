//! Resilience patterns for fault tolerance
//!
//! This module provides **generic, reusable** building blocks:
//! - **Circuit Breaker**: stops calling an unhealthy dependency and probes it
//!   back to health
//! - **Backoff Policy**: bounded retry loop with exponential, linear or fixed
//!   delays and jitter
//! - **Request Context**: cancellation token plus deadline raced at every
//!   suspension point
//!
//! The pieces compose from the outside in:
//!
//! ```text
//! RequestContext ─▶ BackoffPolicy::retry ─▶ CircuitBreaker::execute ─▶ operation
//! ```
//!
//! Everything is generic over the operation's error type; classification is
//! delegated to [`RetryPolicy`] implementations.

pub mod backoff;
pub mod circuit_breaker;
pub mod context;

// Re-export commonly used types
pub use backoff::{
    policies, BackoffConfig, BackoffConfigBuilder, BackoffKind, BackoffPolicy, RetryDecision,
    RetryError, RetryPolicy, RetryResult,
};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerStats,
    CircuitState, Clock, ConfigError, ConfigResult, MockClock, ResilienceError, ResilienceResult,
    SystemClock,
};
pub use context::{ContextError, RequestContext};
