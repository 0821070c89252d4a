//! Domain constants
//!
//! Centralized location for controller API paths, header names and input
//! limits used throughout the session engine.

// Controller API paths
pub const LOGIN_PATH: &str = "/api/login";
pub const LOGOUT_PATH: &str = "/api/logout";
pub const SITE_API_PREFIX: &str = "/api/s";
pub const DEFAULT_SITE: &str = "default";

pub const DEVICES_PATH: &str = "/stat/device";
pub const ACTIVE_CLIENTS_PATH: &str = "/stat/sta";
pub const ALL_CLIENTS_PATH: &str = "/stat/alluser";
pub const RECENT_EVENTS_PATH: &str = "/stat/event";
pub const ALL_EVENTS_PATH: &str = "/rest/event";
pub const STATION_MANAGER_PATH: &str = "/cmd/stamgr";
pub const USER_REST_PATH: &str = "/rest/user";

// Anti-forgery token header (sent and received)
pub const CSRF_HEADER: &str = "X-Csrf-Token";

// Input limits
pub const MAX_CREDENTIAL_FIELD_LENGTH: usize = 256;
pub const MAX_PATH_LENGTH: usize = 1000;
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

// Default timeouts
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 90;

// Credential sources
pub const DEFAULT_USERNAME_ENV: &str = "UNIGATE_USERNAME";
pub const DEFAULT_PASSWORD_ENV: &str = "UNIGATE_PASSWORD";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "unigate";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "default";
