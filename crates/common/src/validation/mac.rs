//! MAC address validation for station commands

use once_cell::sync::Lazy;
use regex::Regex;

use super::endpoint::EndpointValidationError;

static MAC_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{2}([:-][0-9A-Fa-f]{2}){5}$").ok());

/// Validate a MAC address and normalize it to lowercase, colon-separated
///
/// Accepts `AA:BB:CC:DD:EE:FF` and `aa-bb-cc-dd-ee-ff`.
pub fn normalize_mac(mac: &str) -> Result<String, EndpointValidationError> {
    let candidate = mac.trim();
    let valid = MAC_PATTERN.as_ref().is_some_and(|re| re.is_match(candidate));
    if !valid {
        return Err(EndpointValidationError::InvalidPayload {
            reason: format!("{candidate:?} is not a MAC address"),
        });
    }
    Ok(candidate.to_ascii_lowercase().replace('-', ":"))
}

/// Validate and normalize a list of MAC addresses; the list must not be
/// empty
pub fn normalize_macs<S: AsRef<str>>(macs: &[S]) -> Result<Vec<String>, EndpointValidationError> {
    if macs.is_empty() {
        return Err(EndpointValidationError::InvalidPayload {
            reason: "at least one MAC address is required".to_string(),
        });
    }
    macs.iter().map(|mac| normalize_mac(mac.as_ref())).collect()
}
