//! Retry loop with pluggable delay curves and jitter
//!
//! [`BackoffPolicy`] is stateless across calls and can be shared freely.
//! Each call to [`BackoffPolicy::retry`] makes at most `max_retries + 1`
//! attempts, consulting a [`RetryPolicy`] after every failure and racing
//! every attempt and every sleep against a [`RequestContext`].

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use unigate_domain::{BackoffSettings, ErrorKind};

pub use unigate_domain::BackoffKind;

use super::circuit_breaker::{ConfigError, ConfigResult};
use super::context::{ContextError, RequestContext};
use crate::error::{ErrorClassification, ErrorSeverity, HasKind};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable {
        #[source]
        source: E,
    },

    /// The context was cancelled or its deadline elapsed
    #[error("Retry stopped after {attempts} attempts: {reason}")]
    Cancelled { attempts: u32, reason: ContextError },
}

impl<E> RetryError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The last operation error, if any attempt completed
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }
}

impl<E> HasKind for RetryError<E>
where
    E: std::error::Error + HasKind + Send + Sync + 'static,
{
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => source.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

impl<E> ErrorClassification for RetryError<E>
where
    E: std::error::Error + ErrorClassification + Send + Sync + 'static,
{
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AttemptsExhausted { .. } => ErrorSeverity::Error,
            Self::NonRetryable { source } => source.severity(),
            Self::Cancelled { .. } => ErrorSeverity::Info,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Delay curve and attempt bound
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub strategy: BackoffKind,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub multiplier: f64,
    /// Fraction of the computed delay used as the jitter window, in `[0, 1]`
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from(&BackoffSettings::default())
    }
}

impl From<&BackoffSettings> for BackoffConfig {
    fn from(settings: &BackoffSettings) -> Self {
        Self {
            strategy: settings.strategy,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_retries: settings.max_retries,
            multiplier: settings.multiplier,
            jitter_fraction: settings.jitter_fraction,
        }
    }
}

impl BackoffConfig {
    pub fn builder() -> BackoffConfigBuilder {
        BackoffConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "jitter_fraction must be within [0, 1], got {}",
                    self.jitter_fraction
                ),
            });
        }

        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "multiplier must be a non-negative number, got {}",
                    self.multiplier
                ),
            });
        }

        if self.max_delay < self.initial_delay {
            return Err(ConfigError::Invalid {
                message: "max_delay must be greater than or equal to initial_delay".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for BackoffConfig
#[derive(Debug, Default)]
pub struct BackoffConfigBuilder {
    config: BackoffConfig,
}

impl BackoffConfigBuilder {
    pub fn strategy(mut self, strategy: BackoffKind) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.config.jitter_fraction = fraction;
        self
    }

    pub fn no_jitter(self) -> Self {
        self.jitter_fraction(0.0)
    }

    pub fn build(self) -> ConfigResult<BackoffConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Retry executor: delay curve plus retry decision
#[derive(Debug, Clone)]
pub struct BackoffPolicy<P = policies::RetryableKinds> {
    config: BackoffConfig,
    policy: P,
}

impl<P: Default> Default for BackoffPolicy<P> {
    fn default() -> Self {
        Self { config: BackoffConfig::default(), policy: P::default() }
    }
}

impl BackoffPolicy<policies::RetryableKinds> {
    /// Policy that retries every error kind
    pub fn new(config: BackoffConfig) -> ConfigResult<Self> {
        Self::with_policy(config, policies::RetryableKinds::any())
    }
}

impl<P> BackoffPolicy<P> {
    pub fn with_policy(config: BackoffConfig, policy: P) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    /// Swap the retry decision, keeping the delay curve
    pub fn retry_on<Q>(self, policy: Q) -> BackoffPolicy<Q> {
        BackoffPolicy { config: self.config, policy }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Delay before retry number `attempt + 1`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_delay.as_nanos() as f64;
        let max = self.config.max_delay.as_nanos() as f64;
        let multiplier = self.config.multiplier;

        let raw = match self.config.strategy {
            BackoffKind::Fixed => return self.config.initial_delay,
            BackoffKind::Exponential => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                initial * multiplier.powi(exponent)
            }
            BackoffKind::Linear => initial * (1.0 + multiplier * f64::from(attempt)),
        };

        let capped = if raw.is_finite() { raw.min(max) } else { max };
        Duration::from_nanos(capped.max(0.0) as u64)
    }

    /// Delay before retry number `attempt + 1`, jitter applied
    ///
    /// The jitter window is `delay * jitter_fraction`, centred on the base
    /// delay. A result below zero falls back to `initial_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.config.jitter_fraction <= 0.0 {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let half_range = base_secs * self.config.jitter_fraction / 2.0;
        let offset = rand::thread_rng().gen_range(-half_range..=half_range);
        let jittered = base_secs + offset;

        if jittered < 0.0 {
            self.config.initial_delay
        } else {
            Duration::from_secs_f64(jittered)
        }
    }

    /// Run `operation` until it succeeds, fails terminally, runs out of
    /// attempts, or `ctx` ends
    ///
    /// The closure receives the zero-based attempt index.
    #[instrument(level = "debug", skip_all, fields(max_retries = self.config.max_retries))]
    pub async fn retry<F, Fut, T, E>(
        &self,
        ctx: &RequestContext,
        mut operation: F,
    ) -> RetryResult<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: RetryPolicy<E>,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            if let Err(reason) = ctx.check() {
                return Err(RetryError::Cancelled { attempts: attempt, reason });
            }

            let error = match ctx.run(operation(attempt)).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} attempts", attempt + 1);
                    }
                    return Ok(value);
                }
                Ok(Err(error)) => error,
                Err(reason) => {
                    return Err(RetryError::Cancelled { attempts: attempt + 1, reason });
                }
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(error = %error, "Non-retryable error, giving up");
                    return Err(RetryError::NonRetryable { source: error });
                }
                RetryDecision::Retry => self.delay(attempt),
                RetryDecision::RetryAfter(hint) => hint.min(self.config.max_delay),
            };

            if attempt + 1 >= max_attempts {
                warn!(error = %error, "All {} attempts exhausted", max_attempts);
                return Err(RetryError::AttemptsExhausted { attempts: attempt + 1, source: error });
            }

            warn!(
                error = %error,
                "Operation failed (attempt {}), retrying after {:?}",
                attempt + 1,
                delay
            );

            if let Err(reason) = ctx.sleep(delay).await {
                return Err(RetryError::Cancelled { attempts: attempt + 1, reason });
            }
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::*;

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }

    /// Retry driven by [`ErrorClassification`], honouring `retry_after`
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            error.retry_after().map_or(RetryDecision::Retry, RetryDecision::RetryAfter)
        }
    }

    /// Retry by [`ErrorKind`]
    ///
    /// An empty set retries every kind; a non-empty set retries only the
    /// listed kinds. `CircuitOpen` and `Cancelled` are never retried.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct RetryableKinds {
        kinds: HashSet<ErrorKind>,
    }

    impl RetryableKinds {
        /// Retry every kind except the always-terminal ones
        pub fn any() -> Self {
            Self::default()
        }

        pub fn only(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
            Self { kinds: kinds.into_iter().collect() }
        }

        /// Transport failures, transient HTTP statuses and expired sessions
        pub fn transient() -> Self {
            Self::only([
                ErrorKind::RetryableTransport,
                ErrorKind::RetryableHttp,
                ErrorKind::ReauthRequired,
            ])
        }

        pub fn allows(&self, kind: ErrorKind) -> bool {
            if matches!(kind, ErrorKind::CircuitOpen | ErrorKind::Cancelled) {
                return false;
            }
            self.kinds.is_empty() || self.kinds.contains(&kind)
        }
    }

    impl<E: HasKind> RetryPolicy<E> for RetryableKinds {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if self.allows(error.kind()) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
