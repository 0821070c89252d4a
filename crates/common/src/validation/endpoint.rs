//! Allow/deny-list validation of controller API requests
//!
//! A request is checked in three independent steps before it reaches the
//! network: the HTTP method, the site-relative path, and the body.
//!
//! Path checks run in order:
//! 1. shape (non-empty, bounded length, leading `/`)
//! 2. deny-list on the raw and the percent-decoded form
//! 3. allow-list of known endpoint families

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use unigate_domain::constants::{MAX_PATH_LENGTH, MAX_PAYLOAD_BYTES};
use unigate_domain::ErrorKind;

use crate::error::{ErrorClassification, ErrorSeverity, HasKind};

/// Endpoint families the controller exposes under `/api/s/{site}`
const DEFAULT_ALLOWED_TEMPLATES: &[&str] = &[
    r"^/stat/(device|device-basic|sta|alluser|user|event|alarm|health|sysinfo|routing|portforward|dpi|report/[a-z.]+)(/[A-Za-z0-9_:-]{1,64})?$",
    r"^/rest/(user|event|setting|networkconf|wlanconf|firewallrule|portconf|routing|usergroup)(/[A-Za-z0-9_:-]{1,64})?$",
    r"^/cmd/(stamgr|devmgr|evtmgr|sitemgr|backup)$",
    r"^/list/(user|alarm|event)(/[A-Za-z0-9_:-]{1,64})?$",
    r"^/self$",
];

const SYSTEM_PREFIXES: &[&str] = &["/etc", "/proc", "/sys", "/dev", "/root", "/var", "/bin", "/usr"];

const DANGEROUS_CHARS: &[char] = &['<', '>', '"', '\'', '|', ';', '&', '$', '`', '\\', '\0'];

const ENCODED_SEQUENCES: &[&str] = &["%2e", "%2f", "%5c", "%00"];

const SCRIPT_MARKERS: &[&str] = &["<script", "javascript:", "onerror=", "onload=", "eval("];

static DEFAULT_ALLOW_LIST: Lazy<Vec<Regex>> = Lazy::new(|| {
    DEFAULT_ALLOWED_TEMPLATES.iter().filter_map(|pattern| Regex::new(pattern).ok()).collect()
});

/// Why a request was refused before sending
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointValidationError {
    #[error("HTTP method {method:?} is not permitted")]
    InvalidMethod { method: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("unsafe path {path:?}: {reason}")]
    UnsafePath { path: String, reason: String },

    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },
}

impl EndpointValidationError {
    fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath { path: truncate(path), reason: reason.into() }
    }

    fn unsafe_path(path: &str, reason: impl Into<String>) -> Self {
        Self::UnsafePath { path: truncate(path), reason: reason.into() }
    }

    fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload { reason: reason.into() }
    }
}

impl HasKind for EndpointValidationError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMethod { .. } => ErrorKind::InvalidMethod,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::UnsafePath { .. } => ErrorKind::UnsafePath,
            Self::InvalidPayload { .. } => ErrorKind::InvalidPayload,
        }
    }
}

impl ErrorClassification for EndpointValidationError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::for_kind(self.kind())
    }
}

/// Keeps rejected input out of error messages at full size
fn truncate(path: &str) -> String {
    const SHOWN: usize = 80;
    if path.len() <= SHOWN {
        return path.to_string();
    }
    let mut end = SHOWN;
    while !path.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &path[..end])
}

/// HTTP verbs accepted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path validation seam, so callers can swap in a stricter rule set
pub trait PathValidator: Send + Sync {
    fn validate_path(&self, path: &str) -> Result<(), EndpointValidationError>;
}

/// Default validator for controller endpoints
#[derive(Debug, Clone)]
pub struct EndpointValidator {
    allowed: Vec<Regex>,
}

impl Default for EndpointValidator {
    fn default() -> Self {
        Self { allowed: DEFAULT_ALLOW_LIST.clone() }
    }
}

impl EndpointValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra allow-list template (anchored regex)
    pub fn with_allowed_template(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.allowed.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Normalize caller input: trim whitespace and trailing slashes
    pub fn sanitize_path(path: &str) -> String {
        let trimmed = path.trim();
        let stripped = trimmed.trim_end_matches('/');
        if stripped.is_empty() && trimmed.starts_with('/') {
            "/".to_string()
        } else {
            stripped.to_string()
        }
    }

    /// Accept GET, POST and PUT; DELETE is never permitted
    pub fn validate_method(&self, method: &str) -> Result<HttpMethod, EndpointValidationError> {
        match method.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            _ => Err(EndpointValidationError::InvalidMethod { method: method.to_string() }),
        }
    }

    pub fn validate_path(&self, path: &str) -> Result<(), EndpointValidationError> {
        if path.is_empty() {
            return Err(EndpointValidationError::invalid_path(path, "path is empty"));
        }
        if path.len() > MAX_PATH_LENGTH {
            return Err(EndpointValidationError::invalid_path(
                path,
                format!("path exceeds {MAX_PATH_LENGTH} characters"),
            ));
        }
        if !path.starts_with('/') {
            return Err(EndpointValidationError::invalid_path(path, "path must start with '/'"));
        }

        let lowered = path.to_ascii_lowercase();
        if let Some(seq) = ENCODED_SEQUENCES.iter().find(|seq| lowered.contains(*seq)) {
            return Err(EndpointValidationError::unsafe_path(
                path,
                format!("encoded sequence {seq} is not allowed"),
            ));
        }

        check_deny_list(path, path)?;

        let decoded = urlencoding::decode(path).map_err(|_| {
            EndpointValidationError::invalid_path(path, "percent-encoding is not valid UTF-8")
        })?;
        check_deny_list(path, &decoded)?;

        if self.allowed.iter().any(|re| re.is_match(path)) {
            Ok(())
        } else {
            Err(EndpointValidationError::invalid_path(path, "endpoint is not in the allow-list"))
        }
    }

    /// Check a request body
    ///
    /// Empty bodies pass. Otherwise the body must be at most 1 MiB of UTF-8
    /// without NUL bytes, look like a JSON object or array, and carry no
    /// script-injection markers.
    pub fn validate_payload(&self, body: &[u8]) -> Result<(), EndpointValidationError> {
        if body.is_empty() {
            return Ok(());
        }
        if body.len() > MAX_PAYLOAD_BYTES {
            return Err(EndpointValidationError::invalid_payload(format!(
                "payload exceeds {MAX_PAYLOAD_BYTES} bytes"
            )));
        }
        if body.contains(&0) {
            return Err(EndpointValidationError::invalid_payload("payload contains NUL bytes"));
        }

        let text = std::str::from_utf8(body)
            .map_err(|_| EndpointValidationError::invalid_payload("payload is not UTF-8"))?;
        let trimmed = text.trim();

        let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'));
        if !looks_like_json {
            return Err(EndpointValidationError::invalid_payload(
                "payload must be a JSON object or array",
            ));
        }

        let lowered = trimmed.to_ascii_lowercase();
        if let Some(marker) = SCRIPT_MARKERS.iter().find(|marker| lowered.contains(*marker)) {
            return Err(EndpointValidationError::invalid_payload(format!(
                "payload contains forbidden content {marker:?}"
            )));
        }

        Ok(())
    }
}

impl PathValidator for EndpointValidator {
    fn validate_path(&self, path: &str) -> Result<(), EndpointValidationError> {
        EndpointValidator::validate_path(self, path)
    }
}

fn check_deny_list(original: &str, candidate: &str) -> Result<(), EndpointValidationError> {
    if candidate.contains("..") {
        return Err(EndpointValidationError::unsafe_path(original, "path traversal"));
    }
    if candidate.contains("//") {
        return Err(EndpointValidationError::unsafe_path(original, "empty path segment"));
    }
    if let Some(prefix) = SYSTEM_PREFIXES
        .iter()
        .find(|prefix| candidate == **prefix || candidate.starts_with(&format!("{prefix}/")))
    {
        return Err(EndpointValidationError::unsafe_path(
            original,
            format!("system directory {prefix}"),
        ));
    }
    if let Some(c) = candidate.chars().find(|c| DANGEROUS_CHARS.contains(c) || c.is_control()) {
        return Err(EndpointValidationError::unsafe_path(
            original,
            format!("character {c:?} is not allowed"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(result: Result<(), EndpointValidationError>) -> ErrorKind {
        result.unwrap_err().kind()
    }

    /// Validates allow-listed endpoint families.
    ///
    /// Assertions:
    /// - Confirms known paths with and without identifiers are accepted.
    #[test]
    fn test_accepts_known_endpoints() {
        let v = EndpointValidator::new();
        for path in [
            "/stat/device",
            "/stat/sta",
            "/stat/alluser",
            "/rest/user/12345",
            "/rest/user/5f1e2d3c4b5a69788796a5b4",
            "/cmd/stamgr",
            "/list/alarm",
            "/self",
        ] {
            assert!(v.validate_path(path).is_ok(), "{path} should be accepted");
        }
    }

    #[test]
    fn test_rejects_unsafe_paths() {
        let v = EndpointValidator::new();
        for path in [
            "/stat/../../../etc/passwd",
            "/stat//device",
            "/stat/%2e%2e/x",
            "/stat/%2E%2E/x",
            "/stat/device%2fx",
            "/etc/passwd",
            "/proc",
            "/stat/device;rm",
            "/stat/<script>",
            "/stat/device\0",
        ] {
            assert_eq!(kind_of(v.validate_path(path)), ErrorKind::UnsafePath, "{path}");
        }
    }

    #[test]
    fn test_decoded_form_is_checked() {
        let v = EndpointValidator::new();
        // %3b decodes to ';'
        assert_eq!(kind_of(v.validate_path("/stat/device%3bx")), ErrorKind::UnsafePath);
        // invalid UTF-8 after decoding
        assert_eq!(kind_of(v.validate_path("/stat/%ff%fe")), ErrorKind::InvalidPath);
    }

    #[test]
    fn test_rejects_malformed_paths() {
        let v = EndpointValidator::new();
        assert_eq!(kind_of(v.validate_path("")), ErrorKind::InvalidPath);
        assert_eq!(kind_of(v.validate_path("stat/device")), ErrorKind::InvalidPath);
        assert_eq!(kind_of(v.validate_path("/invalid/api/call")), ErrorKind::InvalidPath);

        let long = format!("/{}", "a".repeat(1000));
        assert_eq!(long.len(), 1001);
        let err = v.validate_path(&long).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert!(err.to_string().len() < 200);
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(EndpointValidator::sanitize_path("  /stat/device/ "), "/stat/device");
        assert_eq!(EndpointValidator::sanitize_path("/"), "/");
        assert_eq!(EndpointValidator::sanitize_path("/self///"), "/self");
    }

    #[test]
    fn test_custom_template() {
        let v = EndpointValidator::new().with_allowed_template(r"^/upd/user/[0-9a-f]{24}$").unwrap();
        assert!(v.validate_path("/upd/user/5f1e2d3c4b5a69788796a5b4").is_ok());
        assert!(EndpointValidator::new().validate_path("/upd/user/5f1e2d3c4b5a69788796a5b4").is_err());
    }

    #[test]
    fn test_methods() {
        let v = EndpointValidator::new();
        assert_eq!(v.validate_method("GET").unwrap(), HttpMethod::Get);
        assert_eq!(v.validate_method("post").unwrap(), HttpMethod::Post);
        assert_eq!(v.validate_method("PUT").unwrap().to_string(), "PUT");
        assert_eq!(v.validate_method("DELETE").unwrap_err().kind(), ErrorKind::InvalidMethod);
        assert!(v.validate_method("PATCH").is_err());
    }

    /// Validates payload rules.
    ///
    /// Assertions:
    /// - Confirms empty and JSON-shaped bodies pass.
    /// - Confirms NUL, non-JSON, oversize and script markers are rejected.
    #[test]
    fn test_payloads() {
        let v = EndpointValidator::new();
        assert!(v.validate_payload(b"").is_ok());
        assert!(v.validate_payload(br#"{"cmd":"kick-sta","mac":"aa:bb:cc:dd:ee:ff"}"#).is_ok());
        assert!(v.validate_payload(b"  [1, 2, 3]\n").is_ok());

        let bad: [&[u8]; 5] = [
            b"{\"a\":\0}",
            b"plain text",
            br#"{"name":"<SCRIPT>alert(1)</script>"}"#,
            br#"{"url":"JavaScript:void(0)"}"#,
            br#"{"x":"eval(1)"}"#,
        ];
        for body in bad {
            assert_eq!(kind_of(v.validate_payload(body)), ErrorKind::InvalidPayload);
        }

        let mut big = vec![b' '; MAX_PAYLOAD_BYTES];
        big[0] = b'{';
        big.push(b'}');
        assert_eq!(kind_of(v.validate_payload(&big)), ErrorKind::InvalidPayload);
    }
}
