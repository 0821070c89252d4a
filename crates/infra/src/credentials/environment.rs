use unigate_common::security::SecureCredential;
use unigate_domain::constants::{DEFAULT_PASSWORD_ENV, DEFAULT_USERNAME_ENV};

use super::{CredentialSource, CredentialSourceError};

/// Reads the login from a pair of environment variables
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    username_var: String,
    password_var: String,
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME_ENV, DEFAULT_PASSWORD_ENV)
    }
}

impl EnvironmentSource {
    pub fn new(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Self { username_var: username_var.into(), password_var: password_var.into() }
    }

    fn read(&self, var: &str) -> Result<String, CredentialSourceError> {
        let reason = match std::env::var(var) {
            Ok(value) if !value.is_empty() => return Ok(value),
            Ok(_) => format!("{var} is empty"),
            Err(_) => format!("{var} is not set"),
        };
        Err(CredentialSourceError::unavailable(self.describe(), reason))
    }
}

impl CredentialSource for EnvironmentSource {
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        let username = self.read(&self.username_var)?;
        let password = self.read(&self.password_var)?;
        Ok(SecureCredential::from_plaintext(username, password)?)
    }

    fn describe(&self) -> String {
        format!("environment (${}, ${})", self.username_var, self.password_var)
    }
}
