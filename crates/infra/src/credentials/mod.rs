//! Credential sources
//!
//! A [`CredentialSource`] produces a [`SecureCredential`] from one place:
//! an interactive prompt, a permission-checked JSON file, environment
//! variables, or the platform secret store. [`CredentialManager`] tries a
//! fixed, ordered list of sources and returns the first success.

mod environment;
mod file;
mod keychain;
mod manager;
mod stdin;

use thiserror::Error;
use unigate_common::error::{ErrorClassification, ErrorSeverity, HasKind};
use unigate_common::security::{CredentialError, KeychainError, SecureCredential};
use unigate_domain::ErrorKind;

pub use environment::EnvironmentSource;
pub use file::{write_credentials_file, CredentialFile, FileSource};
pub use keychain::KeychainSource;
pub use manager::CredentialManager;
pub use stdin::StdinSource;

/// Strategy for obtaining the controller login
///
/// Sources may block (terminal input, keychain prompts).
pub trait CredentialSource: Send + Sync {
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError>;

    /// Short human-readable name, safe to log
    fn describe(&self) -> String;
}

/// Why a source could not produce a credential
#[derive(Debug, Error)]
pub enum CredentialSourceError {
    #[error("{source_name}: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("credential file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("failed to read from {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Keychain(#[from] KeychainError),

    #[error("no credential sources configured")]
    NoSources,

    #[error("no credentials found after trying {attempted} source(s): {last}")]
    Exhausted {
        attempted: usize,
        #[source]
        last: Box<CredentialSourceError>,
    },
}

impl CredentialSourceError {
    pub(crate) fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable { source_name: source_name.into(), reason: reason.into() }
    }
}

impl HasKind for CredentialSourceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFile { .. } => ErrorKind::InvalidCredentialFile,
            Self::Credential(err) => err.kind(),
            Self::Keychain(err) => err.kind(),
            Self::Unavailable { .. } | Self::Io { .. } | Self::NoSources | Self::Exhausted { .. } => {
                ErrorKind::NoCredentialsFound
            }
        }
    }
}

impl ErrorClassification for CredentialSourceError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unavailable { .. } => ErrorSeverity::Info,
            Self::Keychain(err) => err.severity(),
            _ => ErrorSeverity::Error,
        }
    }
}
