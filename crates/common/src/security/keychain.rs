//! Thin wrapper over the platform secret store
//!
//! Backed by `keyring`: Keychain Access on macOS, Credential Manager on
//! Windows, Secret Service on Linux.
//!
//! ```no_run
//! use unigate_common::security::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("unigate");
//! keychain.set_secret("controller-admin", "super-secret")?;
//! let secret = keychain.get_secret("controller-admin")?;
//! assert_eq!(secret.as_str(), "super-secret");
//! # Ok::<(), unigate_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;
use unigate_domain::ErrorKind;
use zeroize::Zeroizing;

use crate::error::{ErrorClassification, ErrorSeverity, HasKind};

/// Secret store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeychainError {
    #[error("no keychain entry for {service}/{account}")]
    NotFound { service: String, account: String },

    #[error("platform secret store unavailable: {0}")]
    Unsupported(String),

    #[error("keychain access failed: {0}")]
    AccessFailed(String),
}

impl HasKind for KeychainError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NoCredentialsFound,
            Self::Unsupported(_) | Self::AccessFailed(_) => ErrorKind::KeychainUnsupported,
        }
    }
}

impl ErrorClassification for KeychainError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Unsupported(_) => ErrorSeverity::Warning,
            Self::AccessFailed(_) => ErrorSeverity::Error,
        }
    }
}

/// Secret store scoped to one service name
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value under `account`
    pub fn set_secret(&self, account: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, account = %account, "Storing secret in keychain");

        let entry = self.create_entry(account)?;
        entry.set_password(value).map_err(|e| self.map_error(account, e))?;

        debug!(service = %self.service_name, account = %account, "Secret stored successfully");
        Ok(())
    }

    /// Retrieve the secret stored under `account`
    pub fn get_secret(&self, account: &str) -> Result<Zeroizing<String>, KeychainError> {
        debug!(service = %self.service_name, account = %account, "Retrieving secret from keychain");

        let entry = self.create_entry(account)?;
        let secret = entry.get_password().map_err(|e| self.map_error(account, e))?;

        Ok(Zeroizing::new(secret))
    }

    /// Delete a secret (idempotent)
    pub fn delete_secret(&self, account: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, account = %account, "Deleting secret from keychain");

        let entry = self.create_entry(account)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(self.map_error(account, e)),
        }
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| self.map_error(account, e))
    }

    fn map_error(&self, account: &str, error: keyring::Error) -> KeychainError {
        match error {
            keyring::Error::NoEntry => KeychainError::NotFound {
                service: self.service_name.clone(),
                account: account.to_string(),
            },
            keyring::Error::PlatformFailure(e) => KeychainError::Unsupported(e.to_string()),
            keyring::Error::NoStorageAccess(e) => KeychainError::Unsupported(e.to_string()),
            other => KeychainError::AccessFailed(format!(
                "{}/{}: {}",
                self.service_name, account, other
            )),
        }
    }
}
