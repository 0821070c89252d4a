//! Shared helpers for the infra integration tests
//!
//! Provides a mock controller (wiremock) wired for plaintext loopback, fast
//! backoff settings and a sink that records what the session reports.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use unigate_common::resilience::{BackoffConfig, CircuitBreakerConfig};
use unigate_infra::{Session, SessionOptions, Sinks, TlsPolicy};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "s3cret-pass";
pub const CSRF_TOKEN: &str = "csrf-token-1";

/// `{"meta": {"rc": "ok"}, "data": data}`
pub fn ok_envelope(data: Value) -> Value {
    json!({ "meta": { "rc": "ok" }, "data": data })
}

pub fn error_envelope(message: &str) -> Value {
    json!({ "meta": { "rc": "error", "msg": message }, "data": [] })
}

/// Millisecond delays, no jitter
pub fn fast_backoff(max_retries: u32) -> BackoffConfig {
    BackoffConfig::builder()
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .max_retries(max_retries)
        .no_jitter()
        .build()
        .expect("valid backoff config")
}

pub fn breaker(max_failures: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .max_failures(max_failures)
        .reset_timeout(Duration::from_secs(60))
        .success_threshold(1)
        .build()
        .expect("valid breaker config")
}

/// Options pointing at `server` with a plaintext login and three retries
pub fn options(server: &MockServer) -> SessionOptions {
    SessionOptions::new()
        .endpoint(server.uri())
        .login(USERNAME, PASSWORD)
        .tls(TlsPolicy::plaintext_loopback())
        .backoff(fast_backoff(3))
        .circuit_breaker(breaker(10))
        .request_timeout(Duration::from_secs(5))
}

/// Accept the standard login `expected` times, handing out [`CSRF_TOKEN`]
pub async fn mount_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({
            "username": USERNAME,
            "password": PASSWORD,
            "strict": true,
            "remember": false,
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Csrf-Token", CSRF_TOKEN)
                .set_body_json(ok_envelope(json!([]))),
        )
        .expect(expected)
        .mount(server)
        .await;
}

/// Route session logs to the test harness; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn initialized(options: SessionOptions) -> Session {
    init_tracing();
    let mut session = Session::new();
    session.initialize(options).await.expect("session initializes");
    session
}

/// Sink that keeps every message for later assertions
#[derive(Debug, Default)]
pub struct RecordingSinks {
    pub out: Mutex<Vec<String>>,
    pub err: Mutex<Vec<String>>,
    pub debug: Mutex<Vec<String>>,
}

impl RecordingSinks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Sinks for RecordingSinks {
    fn out(&self, message: &str) {
        self.out.lock().push(message.to_string());
    }

    fn err(&self, message: &str) {
        self.err.lock().push(message.to_string());
    }

    fn debug(&self, message: &str) {
        self.debug.lock().push(message.to_string());
    }
}
