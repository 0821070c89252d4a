//! Integration tests for validation module
//!
//! Runs the documented accept/reject examples through the public API.

#![cfg(feature = "foundation")]

use unigate_common::error::HasKind;
use unigate_common::validation::{normalize_macs, EndpointValidator, PathValidator};
use unigate_domain::ErrorKind;

fn path_kind(validator: &dyn PathValidator, path: &str) -> Option<ErrorKind> {
    validator.validate_path(path).err().map(|e| e.kind())
}

/// Validates the reference accept/reject table.
///
/// # Test Steps
/// 1. Check allow-listed paths pass
/// 2. Check traversal, doubled slashes and encoded traversal are unsafe
/// 3. Check over-long and unknown paths are invalid
#[test]
fn test_reference_paths() {
    let validator = EndpointValidator::new();

    assert_eq!(path_kind(&validator, "/stat/device"), None);
    assert_eq!(path_kind(&validator, "/rest/user/12345"), None);

    assert_eq!(path_kind(&validator, "/stat/../../../etc/passwd"), Some(ErrorKind::UnsafePath));
    assert_eq!(path_kind(&validator, "/stat//device"), Some(ErrorKind::UnsafePath));
    assert_eq!(path_kind(&validator, "/stat/%2e%2e/x"), Some(ErrorKind::UnsafePath));

    let long = format!("/{}", "x".repeat(1000));
    assert_eq!(path_kind(&validator, &long), Some(ErrorKind::InvalidPath));
    assert_eq!(path_kind(&validator, "/invalid/api/call"), Some(ErrorKind::InvalidPath));
}

/// Validates the full request check as the session performs it.
///
/// # Test Steps
/// 1. Sanitize a path with whitespace and a trailing slash
/// 2. Validate method, path and payload
/// 3. Verify DELETE is rejected regardless of path
#[test]
fn test_request_triplet() {
    let validator = EndpointValidator::new();
    let path = EndpointValidator::sanitize_path(" /cmd/stamgr/ ");

    validator.validate_method("POST").expect("POST allowed");
    validator.validate_path(&path).expect("path allowed");
    validator
        .validate_payload(br#"{"cmd":"block-sta","mac":"aa:bb:cc:dd:ee:ff"}"#)
        .expect("payload allowed");

    let err = validator.validate_method("DELETE").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMethod);
}

#[test]
fn test_mac_batch() {
    let macs = normalize_macs(&["AA:BB:CC:DD:EE:FF"]).expect("valid mac");
    assert_eq!(macs, vec!["aa:bb:cc:dd:ee:ff"]);
    assert!(normalize_macs(&["AA:BB:CC:DD:EE:FF", "bogus"]).is_err());
}
