//! Error taxonomy shared across the session engine
//!
//! Each crate defines its own `thiserror` enums; every one of them maps onto
//! an [`ErrorKind`] so callers can match on the failure category without
//! parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Programmatic category of a session-engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An operation was invoked before `initialize` succeeded
    UninitializedSession,
    /// The circuit breaker rejected the call without running it
    CircuitOpen,
    /// The caller cancelled the call or its deadline elapsed
    Cancelled,
    /// HTTP verb outside the allow-list
    InvalidMethod,
    /// Path is malformed or matches no allow-listed endpoint
    InvalidPath,
    /// Path matched a deny-list rule
    UnsafePath,
    /// Request body failed validation
    InvalidPayload,
    /// TLS policy is inconsistent or unusable
    InvalidTlsConfig,
    /// A referenced certificate or key file does not exist
    CertificateNotFound,
    /// Strict mode rejected an insecure TLS setting
    InsecureTlsRejected,
    /// Username or password is empty or too long
    InvalidCredential,
    /// Every credential source failed
    NoCredentialsFound,
    /// Credential file is unreadable, malformed or too permissive
    InvalidCredentialFile,
    /// The OS secret store is not available on this platform
    KeychainUnsupported,
    /// Transient transport failure (timeout, reset, refused, ...)
    RetryableTransport,
    /// Transport failure that another attempt cannot fix (TLS handshake,
    /// malformed request, redirect loop, undecodable body)
    TerminalTransport,
    /// Transient HTTP status (408, 429, 5xx)
    RetryableHttp,
    /// Session expired; re-authentication was attempted
    ReauthRequired,
    /// Non-retryable HTTP status
    TerminalHttp,
    /// Controller answered with an error envelope
    Api,
    /// Response body could not be decoded
    Decode,
    /// One or more initialization checks failed
    Initialization,
    /// Configuration could not be loaded or is invalid
    Config,
}

impl ErrorKind {
    /// Stable label for logging and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UninitializedSession => "uninitialized_session",
            Self::CircuitOpen => "circuit_open",
            Self::Cancelled => "cancelled",
            Self::InvalidMethod => "invalid_method",
            Self::InvalidPath => "invalid_path",
            Self::UnsafePath => "unsafe_path",
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidTlsConfig => "invalid_tls_config",
            Self::CertificateNotFound => "certificate_not_found",
            Self::InsecureTlsRejected => "insecure_tls_rejected",
            Self::InvalidCredential => "invalid_credential",
            Self::NoCredentialsFound => "no_credentials_found",
            Self::InvalidCredentialFile => "invalid_credential_file",
            Self::KeychainUnsupported => "keychain_unsupported",
            Self::RetryableTransport => "retryable_transport",
            Self::TerminalTransport => "terminal_transport",
            Self::RetryableHttp => "retryable_http",
            Self::ReauthRequired => "reauth_required",
            Self::TerminalHttp => "terminal_http",
            Self::Api => "api",
            Self::Decode => "decode",
            Self::Initialization => "initialization",
            Self::Config => "config",
        }
    }

    /// Kinds the default retry policy re-attempts
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetryableTransport | Self::RetryableHttp | Self::ReauthRequired)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loading error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("Configuration file error: {0}")]
    File(String),
}

impl ConfigError {
    /// Error kind for programmatic matching
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}
