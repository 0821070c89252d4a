//! Configuration management
//!
//! Every default in the session engine comes from the `Default` impls below;
//! nothing is read from process-wide mutable state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_KEYCHAIN_ACCOUNT,
    DEFAULT_KEYCHAIN_SERVICE, DEFAULT_PASSWORD_ENV, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SITE,
    DEFAULT_USERNAME_ENV,
};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub backoff: BackoffSettings,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Controller connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Base URL, e.g. `https://controller.local:8443`
    pub endpoint: String,
    pub site: String,
    pub request_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            site: DEFAULT_SITE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// TLS protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.0")]
    Tls10,
    #[serde(rename = "1.1")]
    Tls11,
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    /// Parse `"1.2"`, `"TLS1.2"`, `"tls12"` and similar spellings
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .trim_start_matches("tlsv")
            .trim_start_matches("tls")
            .chars()
            .filter(|c| *c != '.' && *c != '_')
            .collect();
        match normalized.as_str() {
            "10" => Some(Self::Tls10),
            "11" => Some(Self::Tls11),
            "12" => Some(Self::Tls12),
            "13" => Some(Self::Tls13),
            _ => None,
        }
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tls10 => "TLS1.0",
            Self::Tls11 => "TLS1.1",
            Self::Tls12 => "TLS1.2",
            Self::Tls13 => "TLS1.3",
        };
        f.write_str(label)
    }
}

/// Transport security configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub strict: bool,
    pub min_version: TlsVersion,
    pub max_version: Option<TlsVersion>,
    /// Ordered cipher suite names, e.g. `TLS13_AES_256_GCM_SHA384`
    pub cipher_suites: Vec<String>,
    pub ca_file: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub server_name: Option<String>,
    pub handshake_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub insecure_skip_verify: bool,
    pub allow_loopback_plaintext: bool,
    pub probe_endpoint: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            strict: true,
            min_version: TlsVersion::Tls12,
            max_version: None,
            cipher_suites: Vec::new(),
            ca_file: None,
            client_cert: None,
            client_key: None,
            server_name: None,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            insecure_skip_verify: false,
            allow_loopback_plaintext: false,
            probe_endpoint: true,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub max_failures: u32,
    pub reset_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self { max_failures: 5, reset_timeout_secs: 30, success_threshold: 2 }
    }
}

/// Delay curve used between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Exponential,
    Linear,
    Fixed,
}

/// Retry and backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub strategy: BackoffKind,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            strategy: BackoffKind::Exponential,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            max_retries: 3,
            multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

/// Credential source identifiers, in lookup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSourceKind {
    Stdin,
    File,
    Environment,
    Keychain,
}

/// Credential lookup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub sources: Vec<CredentialSourceKind>,
    pub file: Option<PathBuf>,
    pub username_env: String,
    pub password_env: String,
    pub keychain_service: String,
    pub keychain_account: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                CredentialSourceKind::Environment,
                CredentialSourceKind::File,
                CredentialSourceKind::Keychain,
            ],
            file: None,
            username_env: DEFAULT_USERNAME_ENV.to_string(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            keychain_account: DEFAULT_KEYCHAIN_ACCOUNT.to_string(),
        }
    }
}
