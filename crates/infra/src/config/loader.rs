//! Configuration loader
//!
//! Loads session configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `UNIGATE_ENDPOINT` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `UNIGATE_ENDPOINT`: Controller base URL (required)
//! - `UNIGATE_SITE`: Site name (default `default`)
//! - `UNIGATE_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `UNIGATE_TLS_STRICT`: Strict TLS mode (true/false, default true)
//! - `UNIGATE_CA_FILE`: PEM bundle of extra trust roots
//! - `UNIGATE_CLIENT_CERT`: Client certificate for mutual TLS
//! - `UNIGATE_CLIENT_KEY`: Private key for mutual TLS
//! - `UNIGATE_INSECURE`: Skip certificate verification (true/false)
//!
//! Every section not covered by a variable keeps its `Default`.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./unigate.json` or `./unigate.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};

use unigate_domain::{Config, ConfigError};

type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the endpoint
/// variable is missing or a value is malformed, falls back to loading from
/// a config file.
///
/// # Errors
/// Returns `ConfigError` if configuration cannot be loaded from either
/// source or the file format is invalid.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `UNIGATE_ENDPOINT` must be present; everything else is optional.
///
/// # Errors
/// Returns `ConfigError::Missing` if the endpoint is not set and
/// `ConfigError::Invalid` for unparseable values.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.controller.endpoint = env_var("UNIGATE_ENDPOINT")?;
    if let Ok(site) = std::env::var("UNIGATE_SITE") {
        config.controller.site = site;
    }
    if let Ok(raw) = std::env::var("UNIGATE_TIMEOUT_SECS") {
        config.controller.request_timeout_secs =
            raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                field: "UNIGATE_TIMEOUT_SECS".to_string(),
                message: e.to_string(),
            })?;
    }

    config.tls.strict = env_bool("UNIGATE_TLS_STRICT", config.tls.strict);
    config.tls.insecure_skip_verify = env_bool("UNIGATE_INSECURE", false);
    config.tls.ca_file = env_path("UNIGATE_CA_FILE");
    config.tls.client_cert = env_path("UNIGATE_CLIENT_CERT");
    config.tls.client_key = env_path("UNIGATE_CLIENT_KEY");

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ConfigError::File` if the file is missing or unreadable, and
/// `ConfigError::Invalid` if its contents do not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::File(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::File("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ConfigError::File(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| ConfigError::Invalid {
            field: path.display().to_string(),
            message: format!("Invalid TOML format: {}", e),
        }),
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Invalid {
            field: path.display().to_string(),
            message: format!("Invalid JSON format: {}", e),
        }),
        _ => Err(ConfigError::File(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(base: &Path) -> Vec<PathBuf> {
    vec![
        base.join("config.json"),
        base.join("config.toml"),
        base.join("unigate.json"),
        base.join("unigate.toml"),
        base.join("../config.json"),
        base.join("../config.toml"),
        base.join("../../config.json"),
        base.join("../../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(format!("environment variable {}", key))),
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from)
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
