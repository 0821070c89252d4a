//! Session error type
//!
//! Every failure a session operation can report, classified onto the shared
//! [`ErrorKind`] taxonomy so the retry policy and callers can match on
//! kinds instead of variants.

use std::error::Error as _;
use std::io;

use thiserror::Error;
use unigate_common::error::{ErrorClassification, ErrorSeverity, HasKind};
use unigate_common::resilience::{ConfigError, ContextError, ResilienceError, RetryError};
use unigate_common::security::CredentialError;
use unigate_common::validation::EndpointValidationError;
use unigate_domain::ErrorKind;

use crate::credentials::CredentialSourceError;
use crate::tls::TlsError;

/// Longest response excerpt kept in an HTTP error
const BODY_EXCERPT_LEN: usize = 256;

/// Errors returned by [`Session`](super::Session) operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not initialized")]
    Uninitialized,

    #[error("session initialization failed: {}", summarize(failures))]
    InitializationFailed { failures: Vec<SessionError> },

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("no usable credential configured")]
    MissingCredential,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    CredentialSource(#[from] CredentialSourceError),

    #[error(transparent)]
    Validation(#[from] EndpointValidationError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("invalid resilience configuration: {0}")]
    Resilience(#[from] ConfigError),

    #[error("circuit breaker is open, request not sent")]
    CircuitOpen,

    #[error("request stopped: {reason}")]
    Cancelled { reason: ContextError },

    #[error("transport failure for {method} {url}: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("session expired, re-authentication required")]
    ReauthRequired,

    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    #[error("controller rejected the request: {message}")]
    Api { message: String },

    #[error("no client with MAC {mac}")]
    UnknownClient { mac: String },

    #[error("malformed controller JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SessionError>,
    },
}

impl SessionError {
    pub(crate) fn http(status: u16, url: &str, body: &str) -> Self {
        let mut excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        if excerpt.len() < body.len() {
            excerpt.push_str("...");
        }
        Self::Http { status, url: url.to_string(), body: excerpt }
    }

    /// Status code for HTTP failures, looking through exhausted retries
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub(crate) fn from_resilience(err: ResilienceError<SessionError>) -> Self {
        match err {
            ResilienceError::CircuitOpen => Self::CircuitOpen,
            ResilienceError::OperationFailed { source } => source,
        }
    }

    pub(crate) fn from_retry(err: RetryError<SessionError>) -> Self {
        match err {
            RetryError::NonRetryable { source } => source,
            RetryError::AttemptsExhausted { attempts, source } => {
                Self::RetriesExhausted { attempts, last: Box::new(source) }
            }
            RetryError::Cancelled { reason, .. } => Self::Cancelled { reason },
        }
    }
}

fn summarize(failures: &[SessionError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// 408, 429 and every 5xx are worth retrying
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Whether a transport failure is worth another attempt
///
/// Timeouts, refused or reset connections, broken pipes and truncated
/// exchanges are. TLS failures, malformed requests, redirect loops and
/// undecodable bodies are not.
pub(crate) fn is_transient_transport(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() {
        return false;
    }
    if err.is_timeout() {
        return true;
    }

    let mut cause = err.source();
    while let Some(inner) = cause {
        if inner.is::<rustls::Error>() {
            return false;
        }
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if io_err.get_ref().is_some_and(|wrapped| wrapped.is::<rustls::Error>()) {
                return false;
            }
            return match io_err.kind() {
                kind if is_transient_io(kind) => true,
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => false,
                // DNS and routing failures surface as uncategorized connect errors
                _ => err.is_connect(),
            };
        }
        cause = inner.source();
    }

    if err.is_decode() || err.is_body() {
        return false;
    }
    err.is_connect() || err.is_request()
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
    )
}

impl HasKind for SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Uninitialized => ErrorKind::UninitializedSession,
            Self::InitializationFailed { .. } => ErrorKind::Initialization,
            Self::InvalidEndpoint { .. } | Self::Resilience(_) => ErrorKind::Config,
            Self::MissingCredential => ErrorKind::NoCredentialsFound,
            Self::Credential(err) => err.kind(),
            Self::CredentialSource(err) => err.kind(),
            Self::Validation(err) => err.kind(),
            Self::Tls(err) => err.kind(),
            Self::CircuitOpen => ErrorKind::CircuitOpen,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transport { source, .. } if is_transient_transport(source) => {
                ErrorKind::RetryableTransport
            }
            Self::Transport { .. } => ErrorKind::TerminalTransport,
            Self::ReauthRequired => ErrorKind::ReauthRequired,
            Self::Http { status, .. } if is_retryable_status(*status) => ErrorKind::RetryableHttp,
            Self::Http { .. } => ErrorKind::TerminalHttp,
            Self::Api { .. } | Self::UnknownClient { .. } => ErrorKind::Api,
            Self::Json(_) => ErrorKind::Decode,
            Self::RetriesExhausted { last, .. } => last.kind(),
        }
    }
}

impl ErrorClassification for SessionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RetriesExhausted { .. } => false,
            other => other.kind().is_transient(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::for_kind(self.kind())
    }
}
