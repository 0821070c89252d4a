//! Username/password container with memory hygiene
//!
//! The password never sits in memory as plaintext while stored: it is kept
//! XOR-obfuscated against a random per-instance salt, and both buffers are
//! zeroized when the credential is cleared or dropped. Plaintext only
//! exists inside the [`Zeroizing`] value returned by
//! [`SecureCredential::reveal`].

use std::fmt;

use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;
use unigate_domain::constants::MAX_CREDENTIAL_FIELD_LENGTH;
use unigate_domain::ErrorKind;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{ErrorClassification, ErrorSeverity, HasKind};

const SALT_LEN: usize = 32;

/// Rejected credential input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("username exceeds {max} bytes")]
    UsernameTooLong { max: usize },

    #[error("password exceeds {max} bytes")]
    PasswordTooLong { max: usize },
}

impl HasKind for CredentialError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidCredential
    }
}

impl ErrorClassification for CredentialError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

/// Secret username/password pair
///
/// `Debug` and `Display` never print the password.
pub struct SecureCredential {
    username: String,
    password: Zeroizing<Vec<u8>>,
    salt: Zeroizing<Vec<u8>>,
}

impl SecureCredential {
    /// Validate and store a credential
    ///
    /// Both fields must be non-empty and at most 256 bytes. On rejection the
    /// owned username is zeroized before returning.
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, CredentialError> {
        let mut username = username.into();

        let check = if username.is_empty() {
            Err(CredentialError::EmptyUsername)
        } else if username.len() > MAX_CREDENTIAL_FIELD_LENGTH {
            Err(CredentialError::UsernameTooLong { max: MAX_CREDENTIAL_FIELD_LENGTH })
        } else if password.is_empty() {
            Err(CredentialError::EmptyPassword)
        } else if password.len() > MAX_CREDENTIAL_FIELD_LENGTH {
            Err(CredentialError::PasswordTooLong { max: MAX_CREDENTIAL_FIELD_LENGTH })
        } else {
            Ok(())
        };

        if let Err(err) = check {
            username.zeroize();
            return Err(err);
        }

        Ok(Self::store(username, password.as_bytes()))
    }

    /// Like [`SecureCredential::new`], consuming a plaintext password that is
    /// zeroized afterwards whatever the outcome
    pub fn from_plaintext(
        username: impl Into<String>,
        mut password: String,
    ) -> Result<Self, CredentialError> {
        let result = Self::new(username, &password);
        password.zeroize();
        result
    }

    fn store(username: String, plaintext: &[u8]) -> Self {
        let mut salt = Zeroizing::new(vec![0u8; SALT_LEN]);
        rand::thread_rng().fill_bytes(salt.as_mut_slice());

        let mut password = Zeroizing::new(Vec::with_capacity(plaintext.len()));
        password.extend(plaintext.iter().zip(salt.iter().cycle()).map(|(byte, key)| byte ^ key));

        Self { username, password, salt }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plaintext password, zeroized when the returned value is dropped
    pub fn reveal(&self) -> Zeroizing<String> {
        let plain: Vec<u8> = self
            .password
            .iter()
            .zip(self.salt.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect();

        match String::from_utf8(plain) {
            Ok(text) => Zeroizing::new(text),
            Err(err) => {
                let mut raw = err.into_bytes();
                raw.zeroize();
                Zeroizing::new(String::new())
            }
        }
    }

    /// Zero and release every buffer; afterwards [`Self::is_empty`] is true
    pub fn clear(&mut self) {
        self.username.zeroize();
        self.username = String::new();
        self.password = Zeroizing::new(Vec::new());
        self.salt = Zeroizing::new(Vec::new());
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_empty()
    }

    /// Compare against another credential in constant time
    ///
    /// Contents are compared without data-dependent branching. Lengths are
    /// not treated as secret: credentials of different length compare
    /// unequal immediately.
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        let mine = self.reveal();
        let theirs = other.reveal();

        let usernames = self.username.as_bytes().ct_eq(other.username.as_bytes());
        let passwords = mine.as_bytes().ct_eq(theirs.as_bytes());
        (usernames & passwords).into()
    }

    /// Compare a candidate password in constant time
    pub fn password_matches(&self, candidate: &str) -> bool {
        let mine = self.reveal();
        mine.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl Clone for SecureCredential {
    fn clone(&self) -> Self {
        let plain = self.reveal();
        Self::store(self.username.clone(), plain.as_bytes())
    }
}

impl Drop for SecureCredential {
    fn drop(&mut self) {
        self.username.zeroize();
    }
}

impl fmt::Debug for SecureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCredential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Display for SecureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:***", self.username)
    }
}
