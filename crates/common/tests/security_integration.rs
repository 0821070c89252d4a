//! Integration tests for security module
//!
//! Covers the secure credential lifecycle as a consumer sees it.

#![cfg(feature = "platform")]

use unigate_common::error::HasKind;
use unigate_common::security::{CredentialError, KeychainError, SecureCredential};
use unigate_domain::ErrorKind;

/// Validates the create → reveal → clear lifecycle.
///
/// # Test Steps
/// 1. Create a credential and reveal the password
/// 2. Clear it
/// 3. Verify it is empty and reveals an empty string
#[test]
fn test_credential_lifecycle() {
    let mut cred = SecureCredential::new("admin", "p").expect("valid credential");
    assert_eq!(cred.reveal().as_str(), "p");

    cred.clear();

    assert!(cred.is_empty());
    assert_eq!(cred.reveal().as_str(), "");
}

/// Validates that plaintext input is consumed on every path.
///
/// # Test Steps
/// 1. Build from a valid plaintext password
/// 2. Build from an over-long password
/// 3. Verify the error maps to `InvalidCredential`
#[test]
fn test_from_plaintext_paths() {
    let cred = SecureCredential::from_plaintext("admin", "s3cret".to_string())
        .expect("valid credential");
    assert!(cred.password_matches("s3cret"));

    let err = SecureCredential::from_plaintext("admin", "x".repeat(300)).unwrap_err();
    assert_eq!(err, CredentialError::PasswordTooLong { max: 256 });
    assert_eq!(err.kind(), ErrorKind::InvalidCredential);
}

#[test]
fn test_redaction_in_formatting() {
    let cred = SecureCredential::new("operator", "do-not-print").expect("valid credential");
    let rendered = format!("{cred:?} {cred}");
    assert!(!rendered.contains("do-not-print"));
    assert!(rendered.contains("operator"));
}

#[test]
fn test_keychain_error_classification() {
    let err = KeychainError::Unsupported("no secret service".into());
    assert_eq!(err.kind(), ErrorKind::KeychainUnsupported);
}
