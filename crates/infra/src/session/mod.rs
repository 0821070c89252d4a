//! Controller session
//!
//! A [`Session`] owns the HTTP client (cookie store plus TLS transport), the
//! login state and the pipeline every request goes through:
//!
//! ```text
//! RequestContext ─▶ BackoffPolicy::retry ─▶ CircuitBreaker::execute ─▶ HTTP
//! ```
//!
//! A 401 on a site request marks the login stale and fails the attempt with
//! `ReauthRequired`. The next attempt logs in again before re-issuing the
//! request, so the caller only sees the 401 when the retry budget is spent.

mod errors;
mod operations;
mod options;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use unigate_common::resilience::policies::RetryableKinds;
use unigate_common::resilience::{
    BackoffPolicy, CircuitBreaker, CircuitBreakerStats, RequestContext,
};
use unigate_common::security::{CredentialError, SecureCredential};
use unigate_common::validation::{validate_site, EndpointValidator, HttpMethod, PathValidator};
use unigate_domain::constants::{
    CSRF_HEADER, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SITE, LOGIN_PATH, LOGOUT_PATH,
    SITE_API_PREFIX,
};
use unigate_domain::ApiEnvelope;
use url::Url;
use zeroize::Zeroizing;

pub use errors::SessionError;
pub use options::{SessionOptions, Sinks, TracingSinks};

use crate::credentials::{CredentialManager, CredentialSourceError};
use crate::tls::TlsPolicy;

/// Login state of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    NotAuthenticated,
    /// Holds the controller's login response body
    Authenticated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestMode {
    /// Site request; a 401 means the login expired
    Api,
    /// Login or logout; a 401 is final
    Auth,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    strict: bool,
    remember: bool,
}

/// Authenticated connection to one controller site
pub struct Session {
    endpoint: String,
    /// Endpoint without trailing slash, set once initialization succeeds
    base_url: Option<String>,
    site: String,
    credential: Option<SecureCredential>,
    credential_manager: Option<CredentialManager>,
    tls: TlsPolicy,
    breaker: CircuitBreaker,
    backoff: BackoffPolicy<RetryableKinds>,
    validator: EndpointValidator,
    path_validator: Arc<dyn PathValidator>,
    request_timeout: Duration,
    sinks: Arc<dyn Sinks>,
    client: Option<reqwest::Client>,
    csrf_token: RwLock<Option<String>>,
    auth: Mutex<AuthState>,
    initialized: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Uninitialized session with default resilience, TLS and validation
    /// settings
    pub fn new() -> Self {
        let validator = EndpointValidator::new();
        Self {
            endpoint: String::new(),
            base_url: None,
            site: DEFAULT_SITE.to_string(),
            credential: None,
            credential_manager: None,
            tls: TlsPolicy::default(),
            breaker: CircuitBreaker::default(),
            backoff: BackoffPolicy::<RetryableKinds>::default()
                .retry_on(RetryableKinds::transient()),
            path_validator: Arc::new(validator.clone()),
            validator,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            sinks: Arc::new(TracingSinks),
            client: None,
            csrf_token: RwLock::new(None),
            auth: Mutex::new(AuthState::NotAuthenticated),
            initialized: false,
        }
    }

    /// Merge `options` into the session and check that it can talk to the
    /// controller
    ///
    /// Every check runs even after an earlier one fails: endpoint syntax,
    /// credential availability, TLS policy, client construction and the
    /// endpoint probe. The HTTP client is built on the first successful TLS
    /// validation and reused afterwards.
    ///
    /// # Errors
    /// `InitializationFailed` listing every failed check.
    #[instrument(skip_all)]
    pub async fn initialize(&mut self, options: SessionOptions) -> Result<(), SessionError> {
        let mut failures = self.merge(options);

        let endpoint = match parse_endpoint(&self.endpoint) {
            Ok(url) => Some(url),
            Err(err) => {
                failures.push(err);
                None
            }
        };

        if self.credential.is_none() {
            match self.credential_manager.take() {
                Some(manager) => match lookup_credentials(manager).await {
                    Ok((manager, found)) => {
                        self.credential_manager = Some(manager);
                        match found {
                            Ok(credential) => self.credential = Some(credential),
                            Err(err) => failures.push(err.into()),
                        }
                    }
                    Err(err) => failures.push(err.into()),
                },
                None => failures.push(SessionError::MissingCredential),
            }
        }

        let tls_valid = match self.tls.validate() {
            Ok(()) => true,
            Err(err) => {
                failures.push(err.into());
                false
            }
        };

        if tls_valid && self.client.is_none() {
            match self.tls.build_transport(self.request_timeout) {
                Ok(client) => self.client = Some(client),
                Err(err) => failures.push(err.into()),
            }
        }

        if let (true, Some(client), Some(url)) = (tls_valid, &self.client, &endpoint) {
            if let Err(err) = self.tls.validate_endpoint(client, url).await {
                failures.push(err.into());
            }
        }

        if !failures.is_empty() {
            self.initialized = false;
            let err = SessionError::InitializationFailed { failures };
            self.sinks.err(&err.to_string());
            return Err(err);
        }

        let base_url = endpoint.map(|url| url.as_str().trim_end_matches('/').to_string());
        if self.base_url.is_some() && self.base_url != base_url {
            debug!("Endpoint changed, discarding login state");
            *self.auth.get_mut() = AuthState::NotAuthenticated;
            *self.csrf_token.get_mut() = None;
        }
        self.base_url = base_url;
        self.initialized = true;

        info!(endpoint = %self.endpoint, site = %self.site, "Session initialized");
        Ok(())
    }

    fn merge(&mut self, options: SessionOptions) -> Vec<SessionError> {
        let SessionOptions {
            endpoint,
            site,
            credential,
            username,
            password,
            credential_manager,
            tls,
            circuit_breaker,
            backoff,
            retryable_kinds,
            path_validator,
            request_timeout,
            sinks,
        } = options;
        let mut failures = Vec::new();

        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(site) = site {
            match validate_site(&site) {
                Ok(()) => self.site = site,
                Err(err) => failures.push(err.into()),
            }
        }
        if let Some(sinks) = sinks {
            self.sinks = sinks;
        }
        if let Some(timeout) = request_timeout {
            self.request_timeout = timeout;
        }
        if let Some(policy) = tls {
            self.tls = policy;
        }
        if let Some(validator) = path_validator {
            self.path_validator = validator;
        }
        if let Some(manager) = credential_manager {
            self.credential_manager = Some(manager);
        }

        if let Some(config) = circuit_breaker {
            match CircuitBreaker::new(config) {
                Ok(breaker) => self.breaker = breaker,
                Err(err) => failures.push(err.into()),
            }
        }
        if backoff.is_some() || retryable_kinds.is_some() {
            let config = backoff.unwrap_or_else(|| self.backoff.config().clone());
            let kinds = retryable_kinds.unwrap_or_else(|| self.backoff.policy().clone());
            match BackoffPolicy::with_policy(config, kinds) {
                Ok(policy) => self.backoff = policy,
                Err(err) => failures.push(err.into()),
            }
        }

        match (credential, username, password) {
            (Some(credential), _, _) => self.credential = Some(credential),
            (None, Some(username), Some(password)) => {
                match SecureCredential::new(username, &password) {
                    Ok(credential) => self.credential = Some(credential),
                    Err(err) => failures.push(err.into()),
                }
            }
            (None, Some(_), None) => failures.push(CredentialError::EmptyPassword.into()),
            (None, None, Some(_)) => failures.push(CredentialError::EmptyUsername.into()),
            (None, None, None) => {}
        }

        failures
    }

    /// Log in, or return the cached login response when already logged in
    ///
    /// A 401 here is final; it never triggers another login.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<String, SessionError> {
        let ctx = RequestContext::with_timeout(self.call_budget());
        self.login_with_context(&ctx).await
    }

    pub async fn login_with_context(&self, ctx: &RequestContext) -> Result<String, SessionError> {
        let (client, base) = self.transport()?;
        let mut state = self.auth.lock().await;
        if let AuthState::Authenticated(response) = &*state {
            return Ok(response.clone());
        }

        let response = self
            .backoff
            .retry(ctx, move |_| self.login_once(client, base))
            .await
            .map_err(SessionError::from_retry)?;

        *state = AuthState::Authenticated(response.clone());
        Ok(response)
    }

    /// Drop the current login and log in again
    pub async fn reauthenticate(&self) -> Result<String, SessionError> {
        self.invalidate().await;
        self.login().await
    }

    /// End the controller session and forget the login
    ///
    /// Local state is cleared even when the logout request fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        let (client, base) = self.transport()?;
        let mut state = self.auth.lock().await;
        if *state == AuthState::NotAuthenticated {
            return Ok(());
        }

        let url = format!("{base}{LOGOUT_PATH}");
        let result = self.attempt(client, Method::POST, &url, None, RequestMode::Auth).await;

        *state = AuthState::NotAuthenticated;
        *self.csrf_token.write() = None;
        result?;
        self.sinks.out("Logged out");
        Ok(())
    }

    /// Send an arbitrary site request and return the response body
    ///
    /// The method must be GET, POST or PUT; the path is trimmed and checked
    /// against the path validator; a non-empty body must be a JSON document.
    /// All three checks run before anything touches the network.
    pub async fn raw(&self, method: &str, path: &str, body: &[u8]) -> Result<String, SessionError> {
        let ctx = RequestContext::new();
        self.raw_with_context(&ctx, method, path, body).await
    }

    /// [`Session::raw`] bounded by a caller-owned context
    #[instrument(skip(self, ctx, body), fields(body_len = body.len()))]
    pub async fn raw_with_context(
        &self,
        ctx: &RequestContext,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<String, SessionError> {
        let method = self.validator.validate_method(method)?;
        let path = EndpointValidator::sanitize_path(path);
        self.path_validator.validate_path(&path)?;
        self.validator.validate_payload(body)?;

        let body = (!body.is_empty()).then_some(body);
        let ctx = ctx.child_with_timeout(self.call_budget());
        self.dispatch(&ctx, http_method(method), &path, body).await
    }

    pub async fn auth_state(&self) -> AuthState {
        self.auth.lock().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(*self.auth.lock().await, AuthState::Authenticated(_))
    }

    /// Last anti-forgery token the controller sent
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token.read().clone()
    }

    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Site-scoped request through the retry pipeline, logging in first when
    /// needed
    async fn dispatch(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<String, SessionError> {
        let (client, base) = self.transport()?;
        let url = format!("{base}{SITE_API_PREFIX}/{}{path}", self.site);
        let url = url.as_str();
        let method = &method;
        let rejected = AtomicBool::new(false);
        let rejected = &rejected;

        self.backoff
            .retry(ctx, move |attempt| async move {
                if attempt > 0 {
                    self.sinks.debug(&format!("retry {attempt}: {method} {url}"));
                }
                // After a rejection the request is re-issued whether or not
                // the replacement login succeeded.
                if !rejected.load(Ordering::Acquire) {
                    self.ensure_authenticated(client, base).await?;
                }
                let result = self.attempt(client, method.clone(), url, body, RequestMode::Api).await;
                if matches!(result, Err(SessionError::ReauthRequired)) {
                    rejected.store(true, Ordering::Release);
                    self.relogin(client, base).await;
                }
                result
            })
            .await
            .map_err(SessionError::from_retry)
    }

    /// Log in once if the session holds no login
    ///
    /// Failures here count against the caller's retry budget.
    async fn ensure_authenticated(
        &self,
        client: &reqwest::Client,
        base: &str,
    ) -> Result<(), SessionError> {
        let mut state = self.auth.lock().await;
        if matches!(*state, AuthState::Authenticated(_)) {
            return Ok(());
        }

        debug!("No active login, authenticating before request");
        let response = self.login_once(client, base).await?;
        *state = AuthState::Authenticated(response);
        Ok(())
    }

    /// Replace a login the controller just rejected
    ///
    /// The outcome only updates the login state; the rejected request still
    /// fails with `ReauthRequired` so the retry loop re-issues it.
    async fn relogin(&self, client: &reqwest::Client, base: &str) {
        let mut state = self.auth.lock().await;
        match self.login_once(client, base).await {
            Ok(response) => *state = AuthState::Authenticated(response),
            Err(err) => {
                *state = AuthState::NotAuthenticated;
                warn!(error = %err, "Re-authentication failed");
                self.sinks.err(&format!("Re-authentication failed: {err}"));
            }
        }
    }

    async fn login_once(&self, client: &reqwest::Client, base: &str) -> Result<String, SessionError> {
        let url = format!("{base}{LOGIN_PATH}");
        let payload = self.login_payload()?;
        let response =
            self.attempt(client, Method::POST, &url, Some(payload.as_slice()), RequestMode::Auth).await;
        drop(payload);

        let response = response?;
        decode_envelope::<serde_json::Value>(&response)?;

        let username = self.credential.as_ref().map_or("", SecureCredential::username);
        info!(username, "Logged in to controller");
        self.sinks.out(&format!("Logged in to {} as {username}", self.endpoint));
        Ok(response)
    }

    fn login_payload(&self) -> Result<Zeroizing<Vec<u8>>, SessionError> {
        let credential = self.credential.as_ref().ok_or(SessionError::MissingCredential)?;
        let password = credential.reveal();
        let request = LoginRequest {
            username: credential.username(),
            password: password.as_str(),
            strict: true,
            remember: false,
        };
        Ok(Zeroizing::new(serde_json::to_vec(&request)?))
    }

    /// One breaker-guarded HTTP exchange
    async fn attempt(
        &self,
        client: &reqwest::Client,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        mode: RequestMode,
    ) -> Result<String, SessionError> {
        self.breaker
            .execute(|| self.send(client, method, url, body, mode))
            .await
            .map_err(SessionError::from_resilience)
    }

    #[instrument(level = "debug", skip(self, client, body))]
    async fn send(
        &self,
        client: &reqwest::Client,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        mode: RequestMode,
    ) -> Result<String, SessionError> {
        let mut request = client.request(method.clone(), url).header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body.to_vec());
        }
        let token = self.csrf_token.read().clone();
        if let Some(token) = token {
            request = request.header(CSRF_HEADER, token);
        }

        let transport = |source| SessionError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        self.capture_csrf(response.headers());
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        self.sinks.debug(&format!("{method} {url} -> {}", status.as_u16()));

        if status.is_success() {
            return Ok(text);
        }
        if status == StatusCode::UNAUTHORIZED && mode == RequestMode::Api {
            warn!(url, "Controller rejected the session, login required");
            self.invalidate().await;
            return Err(SessionError::ReauthRequired);
        }

        debug!(status = status.as_u16(), "Controller returned an error status");
        Err(SessionError::http(status.as_u16(), url, &text))
    }

    fn capture_csrf(&self, headers: &HeaderMap) {
        let Some(token) = headers.get(CSRF_HEADER).and_then(|value| value.to_str().ok()) else {
            return;
        };
        let mut current = self.csrf_token.write();
        if current.as_deref() != Some(token) {
            debug!("Anti-forgery token updated");
            *current = Some(token.to_string());
        }
    }

    async fn invalidate(&self) {
        *self.auth.lock().await = AuthState::NotAuthenticated;
        *self.csrf_token.write() = None;
    }

    fn transport(&self) -> Result<(&reqwest::Client, &str), SessionError> {
        match (&self.client, &self.base_url) {
            (Some(client), Some(base)) if self.initialized => Ok((client, base.as_str())),
            _ => Err(SessionError::Uninitialized),
        }
    }

    /// Deadline for one call: every attempt plus every backoff sleep
    fn call_budget(&self) -> Duration {
        let config = self.backoff.config();
        let attempts = config.max_retries.saturating_add(1);
        self.request_timeout
            .saturating_mul(attempts)
            .saturating_add(config.max_delay.saturating_mul(config.max_retries))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("site", &self.site)
            .field("credential", &self.credential)
            .field("tls", &self.tls)
            .field("breaker", &self.breaker)
            .field("request_timeout", &self.request_timeout)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SessionError> {
    let invalid = |reason: String| SessionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(invalid("endpoint is empty".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("endpoint has no host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("endpoint must not carry a query or fragment".to_string()));
    }
    Ok(url)
}

/// Walk the credential chain on the blocking pool
///
/// Sources may prompt on stdin or call into the platform secret store.
async fn lookup_credentials(
    manager: CredentialManager,
) -> Result<
    (CredentialManager, Result<SecureCredential, CredentialSourceError>),
    CredentialSourceError,
> {
    tokio::task::spawn_blocking(move || {
        let found = manager.get_credentials();
        (manager, found)
    })
    .await
    .map_err(|e| CredentialSourceError::unavailable("credential chain", e.to_string()))
}

fn http_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
    }
}

/// Unwrap a `{"meta", "data"}` envelope, turning `rc: error` into
/// [`SessionError::Api`]
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, SessionError> {
    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(body)?;
    if !envelope.meta.is_ok() {
        return Err(SessionError::Api { message: envelope.meta.msg.unwrap_or(envelope.meta.rc) });
    }
    envelope
        .data
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(SessionError::from)
}
