//! # Unigate Domain
//!
//! Domain types shared by the session engine crates.
//!
//! This crate contains:
//! - Configuration structures (controller, TLS, resilience, credentials)
//! - Controller payload types (devices, clients, events) and the response
//!   envelope
//! - The error-kind taxonomy used for programmatic error matching
//! - Domain constants (API paths, header names, limits)
//!
//! ## Architecture
//! - No dependencies on other Unigate crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
