//! Integration tests for the controller session
//!
//! **Coverage:**
//! - Login: payload, response caching, anti-forgery token capture
//! - Expired session: exactly one re-login and one re-issued request
//! - Retry and circuit breaker behaviour against failing endpoints
//! - Request validation before any network traffic
//! - Typed operations: getters, station commands, user details
//! - Initialization failure accumulation
//!
//! **Infrastructure:**
//! - WireMock HTTP server standing in for the controller
//! - Plaintext loopback TLS policy, millisecond backoff delays

#[path = "support.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;

use serde_json::json;
use support::*;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use unigate_common::error::HasKind;
use unigate_common::resilience::{CircuitState, RequestContext};
use unigate_common::security::SecureCredential;
use unigate_domain::ErrorKind;
use unigate_infra::credentials::write_credentials_file;
use unigate_infra::{
    AuthState, CredentialManager, CredentialSource, CredentialSourceError, FileSource, Session,
    SessionError, TlsPolicy,
};
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Login
// ============================================================================

/// Validates `Session::login` behavior for the happy path.
///
/// Assertions:
/// - Confirms the login body carries username, password, strict and remember.
/// - Ensures a second call returns the cached response without a request.
/// - Confirms the anti-forgery token from the response is kept.
#[tokio::test]
async fn test_login_posts_credentials_and_caches_response() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let sinks = RecordingSinks::new();
    let session = initialized(options(&server).sinks(sinks.clone())).await;

    let first = session.login().await.expect("login succeeds");
    let second = session.login().await.expect("cached login");

    assert_eq!(first, second);
    assert!(session.is_authenticated().await);
    assert_eq!(session.csrf_token().as_deref(), Some(CSRF_TOKEN));
    assert!(sinks.out.lock().iter().any(|line| line.contains("Logged in")));
}

#[tokio::test]
async fn test_login_rejection_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let err = session.login().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TerminalHttp);
    assert_eq!(err.status(), Some(401));
    assert_eq!(session.auth_state().await, AuthState::NotAuthenticated);
}

#[tokio::test]
async fn test_login_error_envelope_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope("api.err.Invalid")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let err = session.login().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(err.to_string().contains("api.err.Invalid"));
}

#[tokio::test]
async fn test_logout_clears_login_state() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .and(header("X-Csrf-Token", CSRF_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    session.login().await.expect("login succeeds");
    session.logout().await.expect("logout succeeds");

    assert_eq!(session.auth_state().await, AuthState::NotAuthenticated);
    assert!(session.csrf_token().is_none());
    session.logout().await.expect("second logout is a no-op");
}

// ============================================================================
// Request pipeline
// ============================================================================

/// Validates the request pipeline for the anti-forgery token.
///
/// Assertions:
/// - Ensures the first site request logs in automatically.
/// - Confirms the token handed out at login is echoed on the request.
#[tokio::test]
async fn test_get_devices_logs_in_and_echoes_csrf_token() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/device"))
        .and(header("X-Csrf-Token", CSRF_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([
            { "_id": "d1", "mac": "00:11:22:33:44:55", "type": "uap", "name": "Lobby" },
            { "_id": "d2", "mac": "00:11:22:33:44:66", "type": "usw" },
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let devices = session.get_devices().await.expect("devices");

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name.as_deref(), Some("Lobby"));
    assert_eq!(devices[1].device_type.as_deref(), Some("usw"));
}

/// Validates the request pipeline for an expired session.
///
/// Assertions:
/// - Confirms a 401 on a GET triggers exactly one re-login.
/// - Confirms the GET is re-issued exactly once and its 200 is returned.
#[tokio::test]
async fn test_expired_session_relogs_in_once_and_reissues_request() {
    let server = MockServer::start().await;
    mount_login(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([
            { "mac": "aa:bb:cc:dd:ee:ff", "hostname": "laptop" },
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    session.login().await.expect("initial login");

    let clients = session.get_clients().await.expect("401 is hidden from the caller");
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].display_name(), "laptop");
    assert!(session.is_authenticated().await);
}

/// Validates the request pipeline when the replacement login fails.
///
/// Assertions:
/// - Confirms every attempt re-issues the GET and re-logs in after its 401.
/// - Ensures the failed re-login never surfaces; the call ends with
///   `ReauthRequired` once the retry budget is spent.
#[tokio::test]
async fn test_failed_relogin_still_reissues_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(400))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/sta"))
        .respond_with(ResponseTemplate::new(401))
        .expect(4)
        .mount(&server)
        .await;

    let sinks = RecordingSinks::new();
    let session = initialized(options(&server).sinks(sinks.clone())).await;
    let err = session.get_clients().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReauthRequired);
    assert!(matches!(err, SessionError::RetriesExhausted { attempts: 4, .. }));
    assert!(!session.is_authenticated().await);
    assert_eq!(sinks.err.lock().len(), 4);
}

#[tokio::test]
async fn test_server_errors_retry_until_exhausted() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/event"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let err = session.get_recent_events().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetryableHttp);
    assert_eq!(err.status(), Some(503));
    assert!(matches!(err, SessionError::RetriesExhausted { attempts: 4, .. }));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/rest/event"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let err = session.get_all_events().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TerminalHttp);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_error_envelope_surfaces_controller_message() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/device"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(error_envelope("api.err.NoSiteContext")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let err = session.get_devices().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(err.to_string().contains("api.err.NoSiteContext"));
}

/// Validates transport failures that another attempt cannot fix.
///
/// Assertions:
/// - Confirms a TLS handshake against a plaintext server is
///   `TerminalTransport`.
/// - Ensures it is attempted once and charged to the breaker once.
#[tokio::test]
async fn test_tls_handshake_failure_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\n\r\n").await;
        }
    });

    let options = unigate_infra::SessionOptions::new()
        .endpoint(format!("https://{address}"))
        .login(USERNAME, PASSWORD)
        .tls(TlsPolicy { probe_endpoint: false, ..TlsPolicy::plaintext_loopback() })
        .backoff(fast_backoff(3))
        .circuit_breaker(breaker(10))
        .request_timeout(Duration::from_secs(5));
    let session = initialized(options).await;

    let err = session.get_devices().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TerminalTransport);
    assert!(matches!(err, SessionError::Transport { .. }));
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(session.breaker_stats().total_calls, 1);
}

#[tokio::test]
async fn test_refused_connection_is_retried() {
    let options = unigate_infra::SessionOptions::new()
        .endpoint("http://127.0.0.1:1")
        .login(USERNAME, PASSWORD)
        .tls(TlsPolicy { probe_endpoint: false, ..TlsPolicy::plaintext_loopback() })
        .backoff(fast_backoff(2))
        .circuit_breaker(breaker(10));
    let session = initialized(options).await;

    let err = session.get_devices().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetryableTransport);
    assert!(matches!(err, SessionError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(session.breaker_stats().total_calls, 3);
}

/// Validates the circuit breaker inside the request pipeline.
///
/// Assertions:
/// - Confirms the breaker opens after `max_failures` failed requests.
/// - Ensures the next call is rejected with `CircuitOpen` without reaching
///   the controller.
#[tokio::test]
async fn test_breaker_opens_and_stops_sending() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/device"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let session =
        initialized(options(&server).backoff(fast_backoff(0)).circuit_breaker(breaker(2))).await;

    for _ in 0..2 {
        let err = session.get_devices().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RetryableHttp);
    }
    assert_eq!(session.breaker_stats().state, CircuitState::Open);

    let err = session.get_devices().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let server = MockServer::start().await;
    let session = initialized(options(&server)).await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let ctx = RequestContext::new();
    ctx.cancel();
    let err = session.raw_with_context(&ctx, "GET", "/stat/device", b"").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_slow_controller_hits_deadline() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    session.login().await.expect("login succeeds");

    let ctx = RequestContext::with_timeout(Duration::from_millis(100));
    let err = session.raw_with_context(&ctx, "GET", "/stat/health", b"").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

// ============================================================================
// Raw requests
// ============================================================================

/// Validates `Session::raw` input checks.
///
/// Assertions:
/// - Ensures DELETE, traversal paths, unknown endpoints and non-JSON bodies
///   are rejected with their specific kinds.
/// - Confirms none of them reaches the controller.
#[tokio::test]
async fn test_raw_rejects_bad_input_before_network() {
    let server = MockServer::start().await;
    let session = initialized(options(&server)).await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let cases: [(&str, &str, &[u8], ErrorKind); 5] = [
        ("DELETE", "/rest/user/1", b"", ErrorKind::InvalidMethod),
        ("GET", "/stat/../../../etc/passwd", b"", ErrorKind::UnsafePath),
        ("GET", "/stat/%2e%2e/x", b"", ErrorKind::UnsafePath),
        ("GET", "/invalid/api/call", b"", ErrorKind::InvalidPath),
        ("POST", "/cmd/stamgr", b"kick everyone", ErrorKind::InvalidPayload),
    ];

    for (verb, request_path, body, expected) in cases {
        let err = session.raw(verb, request_path, body).await.unwrap_err();
        assert_eq!(err.kind(), expected, "{verb} {request_path}");
    }
}

#[tokio::test]
async fn test_raw_sanitizes_path_and_returns_body() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({ "cmd": "kick-sta", "mac": "aa:bb:cc:dd:ee:ff" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    let body = session
        .raw("post", "  /cmd/stamgr/ ", br#"{"cmd":"kick-sta","mac":"aa:bb:cc:dd:ee:ff"}"#)
        .await
        .expect("raw request");

    assert!(body.contains("\"rc\":\"ok\""));
}

// ============================================================================
// Typed operations
// ============================================================================

#[tokio::test]
async fn test_kick_sends_one_command_per_normalized_mac() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    for mac in ["aa:bb:cc:dd:ee:01", "aa:bb:cc:dd:ee:02"] {
        Mock::given(method("POST"))
            .and(path("/api/s/default/cmd/stamgr"))
            .and(body_json(json!({ "cmd": "kick-sta", "mac": mac })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
            .expect(1)
            .mount(&server)
            .await;
    }

    let session = initialized(options(&server)).await;
    session.kick(&["AA-BB-CC-DD-EE-01", " aa:bb:cc:dd:ee:02 "]).await.expect("kick");
}

#[tokio::test]
async fn test_station_commands_reject_bad_macs_before_network() {
    let server = MockServer::start().await;
    let session = initialized(options(&server)).await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let err = session.block(&["not-a-mac"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayload);

    let none: [&str; 0] = [];
    let err = session.unblock(&none).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayload);
}

#[tokio::test]
async fn test_forget_sends_single_command() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .and(body_json(json!({
            "cmd": "forget-sta",
            "macs": ["aa:bb:cc:dd:ee:01", "aa:bb:cc:dd:ee:02"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    session.forget(&["aa:bb:cc:dd:ee:01", "aa:bb:cc:dd:ee:02"]).await.expect("forget");
}

/// Validates `Session::set_user_details` lookup and update.
///
/// Assertions:
/// - Confirms the user id is resolved by MAC from the full client list.
/// - Confirms the PUT carries name and fixed IP.
/// - Ensures an unknown MAC is reported without an update.
#[tokio::test]
async fn test_set_user_details_resolves_id_by_mac() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/default/stat/alluser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([
            { "_id": "5f00aa", "mac": "aa:bb:cc:dd:ee:ff", "hostname": "printer" },
            { "_id": "5f00bb", "mac": "11:22:33:44:55:66" },
        ]))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/s/default/rest/user/5f00aa"))
        .and(body_json(json!({
            "name": "Office printer",
            "use_fixedip": true,
            "fixed_ip": "10.0.0.50",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let session = initialized(options(&server)).await;
    session
        .set_user_details("AA:BB:CC:DD:EE:FF", "Office printer", "10.0.0.50")
        .await
        .expect("update");

    let err = session.set_user_details("00:00:00:00:00:01", "ghost", "").await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownClient { .. }));
    assert_eq!(err.kind(), ErrorKind::Api);
}

#[tokio::test]
async fn test_set_user_details_rejects_bad_ip() {
    let server = MockServer::start().await;
    let session = initialized(options(&server)).await;

    let err = session.set_user_details("aa:bb:cc:dd:ee:ff", "x", "10.0.0.999").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPayload);
}

// ============================================================================
// Initialization
// ============================================================================

/// Validates `Session::initialize` failure accumulation.
///
/// Assertions:
/// - Confirms an empty endpoint, a missing credential and an insecure strict
///   TLS policy are all reported in one error.
#[tokio::test]
async fn test_initialize_reports_every_failure() {
    let mut session = Session::new();
    let options = unigate_infra::SessionOptions::new()
        .endpoint("")
        .tls(TlsPolicy { insecure_skip_verify: true, ..TlsPolicy::default() });

    let err = session.initialize(options).await.unwrap_err();
    let SessionError::InitializationFailed { failures } = err else {
        panic!("expected InitializationFailed");
    };
    let kinds: Vec<ErrorKind> = failures.iter().map(HasKind::kind).collect();

    assert!(kinds.contains(&ErrorKind::Config));
    assert!(kinds.contains(&ErrorKind::NoCredentialsFound));
    assert!(kinds.contains(&ErrorKind::InsecureTlsRejected));
    assert!(!session.is_initialized());
}

#[tokio::test]
async fn test_initialize_rejects_plaintext_remote_endpoint() {
    let mut session = Session::new();
    let options = unigate_infra::SessionOptions::new()
        .endpoint("http://controller.example.com:8080")
        .login(USERNAME, PASSWORD)
        .tls(TlsPolicy::plaintext_loopback());

    let err = session.initialize(options).await.unwrap_err();
    let SessionError::InitializationFailed { failures } = err else {
        panic!("expected InitializationFailed");
    };
    assert!(failures.iter().any(|f| f.kind() == ErrorKind::InsecureTlsRejected));
}

#[tokio::test]
async fn test_initialize_probe_reports_unreachable_endpoint() {
    let mut session = Session::new();
    let options = unigate_infra::SessionOptions::new()
        .endpoint("http://127.0.0.1:1")
        .login(USERNAME, PASSWORD)
        .tls(TlsPolicy { probe_endpoint: true, ..TlsPolicy::plaintext_loopback() });

    let err = session.initialize(options).await.unwrap_err();
    let SessionError::InitializationFailed { failures } = err else {
        panic!("expected InitializationFailed");
    };
    assert!(failures.iter().any(|f| f.kind() == ErrorKind::RetryableTransport));
}

#[tokio::test]
async fn test_initialize_pulls_login_from_credential_chain() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("credentials.json");
    let credential = SecureCredential::new(USERNAME, PASSWORD).unwrap();
    write_credentials_file(&file, &credential, None).unwrap();

    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let manager = CredentialManager::new(Vec::new()).with_source(FileSource::new(&file));
    let options = unigate_infra::SessionOptions::new()
        .endpoint(server.uri())
        .credential_manager(manager)
        .tls(TlsPolicy::plaintext_loopback())
        .backoff(fast_backoff(0));

    let session = initialized(options).await;
    session.login().await.expect("login with file credential");
}

/// Records which thread the credential chain runs on
struct ThreadRecordingSource {
    seen: Arc<Mutex<Option<ThreadId>>>,
}

impl CredentialSource for ThreadRecordingSource {
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        *self.seen.lock() = Some(std::thread::current().id());
        Ok(SecureCredential::new(USERNAME, PASSWORD)?)
    }

    fn describe(&self) -> String {
        "thread recorder".to_string()
    }
}

#[tokio::test]
async fn test_credential_lookup_runs_off_the_async_thread() {
    let server = MockServer::start().await;
    let seen = Arc::new(Mutex::new(None));
    let manager = CredentialManager::new(Vec::new())
        .with_source(ThreadRecordingSource { seen: Arc::clone(&seen) });
    let options = unigate_infra::SessionOptions::new()
        .endpoint(server.uri())
        .credential_manager(manager)
        .tls(TlsPolicy::plaintext_loopback());

    let session = initialized(options).await;

    assert!(session.is_initialized());
    let lookup_thread = (*seen.lock()).expect("credential chain consulted");
    assert_ne!(lookup_thread, std::thread::current().id());
}

#[tokio::test]
async fn test_reinitialize_merges_options_and_keeps_login() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/s/branch/stat/device"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new();
    session.initialize(options(&server)).await.expect("first initialize");
    session.login().await.expect("login");

    session
        .initialize(unigate_infra::SessionOptions::new().site("branch"))
        .await
        .expect("second initialize");

    assert_eq!(session.site(), "branch");
    assert!(session.is_authenticated().await);
    assert!(session.get_devices().await.expect("devices").is_empty());
}
