//! # Unigate Infrastructure
//!
//! The impure half of the session engine: everything that touches the
//! network, the filesystem, the terminal or the platform secret store.
//!
//! This crate contains:
//! - Configuration loading (environment variables, JSON/TOML files)
//! - TLS policy validation and rustls/reqwest transport construction
//! - Credential sources (stdin prompt, credential file, environment, OS
//!   keychain) and the ordered [`CredentialManager`] chain
//! - The controller [`Session`]: login, transparent re-authentication and
//!   typed API operations over the resilient request pipeline
//!
//! ## Architecture
//! - Builds on the generic primitives in `unigate-common` (circuit breaker,
//!   backoff, request validation, secure credentials)
//! - Shares configuration and wire types with `unigate-domain`

pub mod config;
pub mod credentials;
pub mod session;
pub mod tls;

// Re-export commonly used items
pub use credentials::{
    CredentialManager, CredentialSource, CredentialSourceError, EnvironmentSource, FileSource,
    KeychainSource, StdinSource,
};
pub use session::{AuthState, Session, SessionError, SessionOptions, Sinks, TracingSinks};
pub use tls::{TlsError, TlsPolicy};
