//! Three-state circuit breaker
//!
//! The breaker wraps any fallible async operation and stops calling it once
//! the downstream side is clearly unhealthy. All state transitions happen
//! under a single exclusive lock; snapshots use the shared lock.
//!
//! ```text
//!            max_failures reached
//!   CLOSED ─────────────────────────▶ OPEN ◀──────────┐
//!     ▲                                │ reset_timeout │ probe fails /
//!     │ success_threshold              ▼ elapsed       │ any failure
//!     └──────────────────────────── HALF_OPEN ─────────┘
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use unigate_domain::{CircuitBreakerSettings, ErrorKind};

use crate::error::{ErrorClassification, ErrorSeverity, HasKind};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward
/// explicitly instead of sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed counter, so a test can keep one handle and
/// hand another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by [`CircuitBreaker::execute`]
///
/// Generic over the wrapped operation's error so the original failure is
/// preserved as the `source`.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Returns the wrapped operation error, if the operation ran
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::CircuitOpen => None,
            Self::OperationFailed { source } => Some(source),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}

impl<E> HasKind for ResilienceError<E>
where
    E: std::error::Error + HasKind + Send + Sync + 'static,
{
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen => ErrorKind::CircuitOpen,
            Self::OperationFailed { source } => source.kind(),
        }
    }
}

impl<E> ErrorClassification for ResilienceError<E>
where
    E: std::error::Error + ErrorClassification + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitOpen => false,
            Self::OperationFailed { source } => source.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CircuitOpen => ErrorSeverity::Warning,
            Self::OperationFailed { source } => source.severity(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen => None,
            Self::OperationFailed { source } => source.retry_after(),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, letting traffic through to confirm recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub max_failures: u32,
    /// Time the circuit stays open before a probe is admitted
    pub reset_timeout: Duration,
    /// Number of successes needed to close the circuit from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            max_failures: settings.max_failures,
            reset_timeout: Duration::from_secs(settings.reset_timeout_secs),
            success_threshold: settings.success_threshold,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_failures == 0 {
            return Err(ConfigError::Invalid {
                message: "max_failures must be greater than 0".to_string(),
            });
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.config.max_failures = max_failures;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Read-only snapshot of the breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_time: Option<Instant>,
    pub state_changed_at: Instant,
    pub probe_in_flight: bool,
    pub total_calls: u64,
    pub rejected_calls: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure_time: Option<Instant>,
    state_changed_at: Instant,
    probe_in_flight: bool,
    total_calls: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure_time: None,
            state_changed_at: now,
            probe_in_flight: false,
            total_calls: 0,
            rejected_calls: 0,
        }
    }

    fn transition(&mut self, to: CircuitState, now: Instant) {
        if self.state != to {
            debug!(from = %self.state, to = %to, "circuit breaker state change");
            self.state = to;
            self.state_changed_at = now;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Regular,
    Probe,
}

/// Clears the probe flag if a probe future is dropped before completing
struct ProbeGuard<'a> {
    inner: &'a RwLock<BreakerState>,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.write().probe_in_flight = false;
        }
    }
}

/// Generic circuit breaker implementation
///
/// Clones share state, so one breaker can guard every request a session
/// makes.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    inner: Arc<RwLock<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failures", &inner.failures)
            .field("successes", &inner.successes)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        let now = SystemClock.now();
        Self {
            config: CircuitBreakerConfig::default(),
            inner: Arc::new(RwLock::new(BreakerState::new(now))),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;
        let now = clock.now();

        Ok(Self {
            config,
            inner: Arc::new(RwLock::new(BreakerState::new(now))),
            clock: Arc::new(clock),
        })
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// While open and inside the reset timeout the operation is not invoked
    /// and [`ResilienceError::CircuitOpen`] is returned. Once the timeout has
    /// elapsed exactly one caller is admitted as a probe; concurrent callers
    /// keep getting `CircuitOpen` until the probe settles.
    #[instrument(level = "debug", skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let Some(admission) = self.admit() else {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen);
        };

        let mut guard =
            ProbeGuard { inner: self.inner.as_ref(), armed: admission == Admission::Probe };

        let outcome = operation().await;
        guard.armed = false;

        match outcome {
            Ok(value) => {
                self.on_success(admission);
                Ok(value)
            }
            Err(error) => {
                self.on_failure(admission);
                debug!(error = %error, "Circuit breaker: operation failed");
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    fn admit(&self) -> Option<Admission> {
        let mut inner = self.inner.write();
        inner.total_calls += 1;

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Some(Admission::Regular),
            CircuitState::Open => {
                let now = self.clock.now();
                let timeout_elapsed = inner
                    .last_failure_time
                    .map_or(true, |at| now.saturating_duration_since(at) > self.config.reset_timeout);

                if timeout_elapsed && !inner.probe_in_flight {
                    inner.probe_in_flight = true;
                    debug!("Circuit breaker admitting probe");
                    Some(Admission::Probe)
                } else {
                    inner.rejected_calls += 1;
                    None
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::Open if admission == Admission::Probe => {
                inner.probe_in_flight = false;
                inner.failures = 0;
                inner.successes = 1;
                inner.transition(CircuitState::HalfOpen, now);
                info!("Circuit breaker probe succeeded, entering half-open");
                self.close_if_recovered(&mut inner, now);
            }
            CircuitState::Open => {
                // Late completion of a call admitted before the circuit opened.
            }
            CircuitState::HalfOpen => {
                inner.successes += 1;
                self.close_if_recovered(&mut inner, now);
            }
        }
    }

    fn close_if_recovered(&self, inner: &mut BreakerState, now: Instant) {
        if inner.successes >= self.config.success_threshold {
            let successes = inner.successes;
            inner.successes = 0;
            inner.failures = 0;
            inner.transition(CircuitState::Closed, now);
            info!("Circuit breaker closed after {} successes", successes);
        }
    }

    fn on_failure(&self, admission: Admission) {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        if inner.state == CircuitState::Open && admission != Admission::Probe {
            // Late completion of a call admitted before the circuit opened.
            return;
        }

        inner.failures += 1;
        inner.successes = 0;
        inner.last_failure_time = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.failures >= self.config.max_failures {
                    inner.transition(CircuitState::Open, now);
                    warn!("Circuit breaker opened after {} failures", inner.failures);
                }
            }
            CircuitState::HalfOpen => {
                inner.transition(CircuitState::Open, now);
                warn!("Circuit breaker re-opened due to failure in half-open state");
            }
            CircuitState::Open => {
                inner.probe_in_flight = false;
                warn!("Circuit breaker probe failed, staying open");
            }
        }
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// Read-only snapshot of counters and state
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read();
        CircuitBreakerStats {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure_time: inner.last_failure_time,
            state_changed_at: inner.state_changed_at,
            probe_in_flight: inner.probe_in_flight,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        inner.failures = 0;
        inner.successes = 0;
        inner.last_failure_time = None;
        inner.probe_in_flight = false;
        inner.transition(CircuitState::Closed, now);
        info!("Circuit breaker manually reset to closed state");
    }
}
