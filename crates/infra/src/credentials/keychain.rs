use serde::{Deserialize, Serialize};
use tracing::debug;
use unigate_common::security::{KeychainProvider, SecureCredential};
use unigate_domain::constants::{DEFAULT_KEYCHAIN_ACCOUNT, DEFAULT_KEYCHAIN_SERVICE};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{CredentialSource, CredentialSourceError};

/// Secret-store payload: the whole login is stored as one JSON secret
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredLogin {
    username: String,
    password: String,
}

/// Reads the login from the platform secret store
///
/// The entry lives under `service`/`account` and holds
/// `{"username", "password"}` as JSON.
#[derive(Debug, Clone)]
pub struct KeychainSource {
    provider: KeychainProvider,
    account: String,
}

impl Default for KeychainSource {
    fn default() -> Self {
        Self::new(DEFAULT_KEYCHAIN_SERVICE, DEFAULT_KEYCHAIN_ACCOUNT)
    }
}

impl KeychainSource {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self { provider: KeychainProvider::new(service), account: account.into() }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Seed the secret store with `credential`
    pub fn store(&self, credential: &SecureCredential) -> Result<(), CredentialSourceError> {
        let login = StoredLogin {
            username: credential.username().to_string(),
            password: credential.reveal().as_str().to_owned(),
        };
        let json = Zeroizing::new(serde_json::to_string(&login).map_err(|e| {
            CredentialSourceError::unavailable(self.describe(), format!("cannot encode: {e}"))
        })?);

        self.provider.set_secret(&self.account, &json)?;
        debug!(account = %self.account, "Stored controller login in keychain");
        Ok(())
    }

    fn decode(&self, secret: &str) -> Result<SecureCredential, CredentialSourceError> {
        let login: StoredLogin = serde_json::from_str(secret).map_err(|_| {
            CredentialSourceError::unavailable(
                self.describe(),
                "keychain entry is not a username/password document",
            )
        })?;
        Ok(SecureCredential::new(login.username.clone(), &login.password)?)
    }
}

impl CredentialSource for KeychainSource {
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        let secret = self.provider.get_secret(&self.account)?;
        self.decode(&secret)
    }

    fn describe(&self) -> String {
        format!("keychain {}/{}", self.provider.service_name(), self.account)
    }
}
