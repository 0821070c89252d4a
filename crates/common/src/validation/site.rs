//! Site name validation
//!
//! The site is interpolated into every request URL as `/api/s/{site}`, so it
//! must be a single path segment.

use once_cell::sync::Lazy;
use regex::Regex;

use super::endpoint::EndpointValidationError;

static SITE_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").ok());

/// Accept short slugs such as `default` or `branch-2`
pub fn validate_site(site: &str) -> Result<(), EndpointValidationError> {
    if SITE_PATTERN.as_ref().is_some_and(|re| re.is_match(site)) {
        return Ok(());
    }
    Err(EndpointValidationError::InvalidPath {
        path: site.chars().take(64).collect(),
        reason: "site name must be 1-64 letters, digits, '-' or '_'".to_string(),
    })
}
