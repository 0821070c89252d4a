//! Secure transport configuration
//!
//! [`TlsPolicy`] describes how the session talks to the controller:
//! protocol bounds, cipher suites, trust roots, client certificates and the
//! escape hatches (`insecure_skip_verify`, plaintext loopback) that strict
//! mode forbids. It validates itself, materializes a rustls
//! [`ClientConfig`](rustls::ClientConfig) and wraps it in a reqwest client.

mod policy;
mod verifier;

use std::path::PathBuf;

use thiserror::Error;
use unigate_common::error::{ErrorClassification, ErrorSeverity, HasKind};
use unigate_domain::ErrorKind;

pub use policy::TlsPolicy;

/// TLS policy and transport failures
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("invalid TLS configuration: {0}")]
    InvalidConfig(String),

    #[error("certificate file not found: {}", path.display())]
    CertificateNotFound { path: PathBuf },

    #[error("insecure TLS setting rejected: {0}")]
    InsecureRejected(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM data in {origin}: {message}")]
    Pem { origin: String, message: String },

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("failed to build HTTP transport: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("endpoint probe to {url} failed: {source}")]
    Probe {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl HasKind for TlsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CertificateNotFound { .. } => ErrorKind::CertificateNotFound,
            Self::InsecureRejected(_) => ErrorKind::InsecureTlsRejected,
            Self::Probe { .. } => ErrorKind::RetryableTransport,
            Self::InvalidConfig(_)
            | Self::Io { .. }
            | Self::Pem { .. }
            | Self::Rustls(_)
            | Self::Client(_)
            | Self::InvalidEndpoint { .. } => ErrorKind::InvalidTlsConfig,
        }
    }
}

impl ErrorClassification for TlsError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Probe { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::for_kind(self.kind())
    }
}
