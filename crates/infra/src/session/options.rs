//! Session options and output sinks

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use unigate_common::resilience::policies::RetryableKinds;
use unigate_common::resilience::{BackoffConfig, CircuitBreakerConfig};
use unigate_common::security::SecureCredential;
use unigate_common::validation::PathValidator;
use unigate_domain::Config;
use zeroize::Zeroizing;

use crate::credentials::CredentialManager;
use crate::tls::TlsPolicy;

/// Where a session reports progress and failures
///
/// `debug` receives wire-level traces and is silent unless overridden.
pub trait Sinks: Send + Sync {
    fn out(&self, message: &str);
    fn err(&self, message: &str);
    fn debug(&self, _message: &str) {}
}

/// Forwards every sink into `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSinks;

impl Sinks for TracingSinks {
    fn out(&self, message: &str) {
        info!(target: "unigate::session", "{message}");
    }

    fn err(&self, message: &str) {
        warn!(target: "unigate::session", "{message}");
    }

    fn debug(&self, message: &str) {
        debug!(target: "unigate::session", "{message}");
    }
}

/// Settings merged into a session by [`Session::initialize`]
///
/// Every field is optional; `None` keeps whatever the session already has.
///
/// [`Session::initialize`]: super::Session::initialize
#[derive(Default)]
pub struct SessionOptions {
    pub endpoint: Option<String>,
    pub site: Option<String>,
    pub credential: Option<SecureCredential>,
    /// Plaintext login, converted into a [`SecureCredential`] on merge
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    /// Consulted only when no credential is configured
    pub credential_manager: Option<CredentialManager>,
    pub tls: Option<TlsPolicy>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub backoff: Option<BackoffConfig>,
    pub retryable_kinds: Option<RetryableKinds>,
    pub path_validator: Option<Arc<dyn PathValidator>>,
    pub request_timeout: Option<Duration>,
    pub sinks: Option<Arc<dyn Sinks>>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options mirroring a loaded [`Config`]
    ///
    /// The credential chain is built from `config.credentials`; an empty
    /// endpoint is left unset so it is reported at initialization.
    pub fn from_config(config: &Config) -> Self {
        let endpoint = Some(config.controller.endpoint.clone()).filter(|e| !e.is_empty());

        Self {
            endpoint,
            site: Some(config.controller.site.clone()),
            credential_manager: Some(CredentialManager::from_config(&config.credentials)),
            tls: Some(TlsPolicy::from(&config.tls)),
            circuit_breaker: Some(CircuitBreakerConfig::from(&config.circuit_breaker)),
            backoff: Some(BackoffConfig::from(&config.backoff)),
            request_timeout: Some(Duration::from_secs(config.controller.request_timeout_secs)),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn credential(mut self, credential: SecureCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Plaintext username and password; the password buffer is zeroized
    /// once converted
    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn credential_manager(mut self, manager: CredentialManager) -> Self {
        self.credential_manager = Some(manager);
        self
    }

    pub fn tls(mut self, policy: TlsPolicy) -> Self {
        self.tls = Some(policy);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Error kinds the request pipeline re-attempts
    pub fn retryable_kinds(mut self, kinds: RetryableKinds) -> Self {
        self.retryable_kinds = Some(kinds);
        self
    }

    pub fn path_validator(mut self, validator: Arc<dyn PathValidator>) -> Self {
        self.path_validator = Some(validator);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn sinks(mut self, sinks: Arc<dyn Sinks>) -> Self {
        self.sinks = Some(sinks);
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("endpoint", &self.endpoint)
            .field("site", &self.site)
            .field("credential", &self.credential)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("credential_manager", &self.credential_manager)
            .field("tls", &self.tls)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
