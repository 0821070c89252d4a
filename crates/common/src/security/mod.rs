//! Security primitives
//!
//! - [`SecureCredential`]: obfuscated, zeroizing username/password pair
//! - [`KeychainProvider`]: platform secret store wrapper

pub mod credential;
pub mod keychain;

pub use credential::{CredentialError, SecureCredential};
pub use keychain::{KeychainError, KeychainProvider};
