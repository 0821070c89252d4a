//! Request validation
//!
//! Everything here is pure: no I/O, no logging. Errors map onto the shared
//! [`ErrorKind`](unigate_domain::ErrorKind) taxonomy via
//! [`HasKind`](crate::error::HasKind).

mod endpoint;
mod mac;
mod site;

pub use endpoint::{EndpointValidationError, EndpointValidator, HttpMethod, PathValidator};
pub use mac::{normalize_mac, normalize_macs};
pub use site::validate_site;

/// Type alias for validation results
pub type ValidationResult<T> = Result<T, EndpointValidationError>;
