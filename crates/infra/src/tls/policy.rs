use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};
use tracing::{debug, instrument, warn};
use unigate_domain::{TlsConfig, TlsVersion};
use url::{Host, Url};

use super::verifier::{parse_server_name, ServerNameOverride, SkipVerification};
use super::TlsError;

/// How the session secures its connection to the controller
///
/// Strict mode (the default) forbids disabling certificate verification,
/// minimum versions below TLS 1.2 and plaintext loopback endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub min_version: TlsVersion,
    /// Upper bound; `None` allows the newest version rustls supports
    pub max_version: Option<TlsVersion>,
    /// Ordered cipher suite names; empty keeps the provider defaults
    pub cipher_suites: Vec<String>,
    pub ca_file: Option<PathBuf>,
    /// Extra trust roots as raw PEM bytes
    pub ca_pem: Option<Vec<u8>>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    /// Verify the server certificate against this name instead of the URL
    /// host
    pub server_name_override: Option<String>,
    pub handshake_timeout: Duration,
    pub idle_timeout: Duration,
    pub strict: bool,
    pub insecure_skip_verify: bool,
    pub allow_loopback_plaintext: bool,
    /// Send a HEAD request to the endpoint during session initialization
    pub probe_endpoint: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self::from(&TlsConfig::default())
    }
}

impl From<&TlsConfig> for TlsPolicy {
    fn from(config: &TlsConfig) -> Self {
        Self {
            min_version: config.min_version,
            max_version: config.max_version,
            cipher_suites: config.cipher_suites.clone(),
            ca_file: config.ca_file.clone(),
            ca_pem: None,
            client_cert: config.client_cert.clone(),
            client_key: config.client_key.clone(),
            server_name_override: config.server_name.clone(),
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            strict: config.strict,
            insecure_skip_verify: config.insecure_skip_verify,
            allow_loopback_plaintext: config.allow_loopback_plaintext,
            probe_endpoint: config.probe_endpoint,
        }
    }
}

impl TlsPolicy {
    /// Non-strict policy that accepts `http://` on loopback hosts
    ///
    /// Meant for controllers running on the same machine and for mock
    /// servers in tests.
    pub fn plaintext_loopback() -> Self {
        Self { strict: false, allow_loopback_plaintext: true, ..Self::default() }
    }

    /// Check the policy without touching the network
    pub fn validate(&self) -> Result<(), TlsError> {
        if self.strict {
            if self.insecure_skip_verify {
                return Err(TlsError::InsecureRejected(
                    "certificate verification cannot be disabled in strict mode".to_string(),
                ));
            }
            if self.min_version < TlsVersion::Tls12 {
                return Err(TlsError::InsecureRejected(format!(
                    "minimum version {} is below TLS1.2",
                    self.min_version
                )));
            }
            if self.allow_loopback_plaintext {
                return Err(TlsError::InsecureRejected(
                    "plaintext loopback endpoints are not allowed in strict mode".to_string(),
                ));
            }
        }

        if let Some(max) = self.max_version {
            if max < self.min_version {
                return Err(TlsError::InvalidConfig(format!(
                    "maximum version {max} is below minimum version {}",
                    self.min_version
                )));
            }
        }

        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(TlsError::InvalidConfig(
                "client certificate and key must be configured together".to_string(),
            ));
        }

        for path in [&self.ca_file, &self.client_cert, &self.client_key].into_iter().flatten() {
            if !path.is_file() {
                return Err(TlsError::CertificateNotFound { path: path.clone() });
            }
        }

        if !self.cipher_suites.is_empty() {
            let available = ring::default_provider().cipher_suites;
            if let Some(unknown) =
                self.cipher_suites.iter().find(|name| find_suite(&available, name).is_none())
            {
                return Err(TlsError::InvalidConfig(format!("unknown cipher suite {unknown}")));
            }
        }

        if let Some(name) = &self.server_name_override {
            parse_server_name(name)?;
        }

        if self.handshake_timeout.is_zero() {
            return Err(TlsError::InvalidConfig("handshake timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Build the rustls client configuration described by this policy
    #[instrument(level = "debug", skip(self), fields(strict = self.strict))]
    pub fn materialize(&self) -> Result<ClientConfig, TlsError> {
        self.validate()?;

        let provider = Arc::new(self.crypto_provider());
        let versions = self.protocol_versions()?;
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&versions)?;

        let builder = if self.insecure_skip_verify {
            warn!("TLS certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipVerification::new(provider)))
        } else {
            let roots = self.root_store()?;
            match &self.server_name_override {
                Some(name) => {
                    debug!(server_name = %name, "Verifying controller certificate against override");
                    let verifier = ServerNameOverride::new(Arc::new(roots), provider, name)?;
                    builder.dangerous().with_custom_certificate_verifier(Arc::new(verifier))
                }
                None => builder.with_root_certificates(roots),
            }
        };

        let mut config = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                let chain = load_certs(cert)?;
                let key = load_private_key(key)?;
                builder.with_client_auth_cert(chain, key)?
            }
            _ => builder.with_no_client_auth(),
        };
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(config)
    }

    /// Build the HTTP transport: materialized TLS, cookie store and timeouts
    pub fn build_transport(&self, request_timeout: Duration) -> Result<reqwest::Client, TlsError> {
        let tls = self.materialize()?;

        reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .cookie_store(true)
            .connect_timeout(self.handshake_timeout)
            .pool_idle_timeout(self.idle_timeout)
            .timeout(request_timeout)
            .no_proxy()
            .build()
            .map_err(TlsError::Client)
    }

    /// Require `https`, or `http` on a loopback host when the policy allows it
    pub fn check_endpoint(&self, url: &Url) -> Result<(), TlsError> {
        match url.scheme() {
            "https" => Ok(()),
            "http" if self.allow_loopback_plaintext && !self.strict && is_loopback(url) => {
                warn!(endpoint = %url, "Using plaintext HTTP to a loopback controller");
                Ok(())
            }
            "http" => Err(TlsError::InsecureRejected(format!(
                "plaintext endpoint {url} is not allowed"
            ))),
            other => Err(TlsError::InvalidEndpoint {
                url: url.to_string(),
                reason: format!("unsupported scheme {other:?}"),
            }),
        }
    }

    /// Check the endpoint scheme, then probe it once with a HEAD request
    ///
    /// Any HTTP response counts as reachable; only transport failures
    /// (DNS, connect, handshake, timeout) are errors.
    pub async fn validate_endpoint(
        &self,
        client: &reqwest::Client,
        url: &Url,
    ) -> Result<(), TlsError> {
        self.check_endpoint(url)?;
        if !self.probe_endpoint {
            return Ok(());
        }

        match client.head(url.clone()).timeout(self.handshake_timeout).send().await {
            Ok(response) => {
                debug!(endpoint = %url, status = %response.status(), "Endpoint probe succeeded");
                Ok(())
            }
            Err(source) => Err(TlsError::Probe { url: url.to_string(), source }),
        }
    }

    fn crypto_provider(&self) -> CryptoProvider {
        let mut provider = ring::default_provider();
        if !self.cipher_suites.is_empty() {
            let available = std::mem::take(&mut provider.cipher_suites);
            provider.cipher_suites =
                self.cipher_suites.iter().filter_map(|name| find_suite(&available, name)).collect();
        }
        provider
    }

    fn protocol_versions(&self) -> Result<Vec<&'static SupportedProtocolVersion>, TlsError> {
        let mut min = self.min_version;
        if min < TlsVersion::Tls12 {
            warn!(requested = %min, "TLS versions below 1.2 are unsupported, raising minimum to TLS1.2");
            min = TlsVersion::Tls12;
        }
        let max = self.max_version.unwrap_or(TlsVersion::Tls13);

        let versions: Vec<&'static SupportedProtocolVersion> =
            [(TlsVersion::Tls12, &rustls::version::TLS12), (TlsVersion::Tls13, &rustls::version::TLS13)]
                .into_iter()
                .filter(|(version, _)| *version >= min && *version <= max)
                .map(|(_, supported)| supported)
                .collect();

        if versions.is_empty() {
            return Err(TlsError::InvalidConfig(format!(
                "no supported protocol version between {min} and {max}"
            )));
        }
        Ok(versions)
    }

    fn root_store(&self) -> Result<RootCertStore, TlsError> {
        let mut roots = RootCertStore { roots: webpki_roots::TLS_SERVER_ROOTS.to_vec() };

        if let Some(path) = &self.ca_file {
            let pem = read_file(path)?;
            add_pem_roots(&mut roots, &pem, &path.display().to_string())?;
        }
        if let Some(pem) = &self.ca_pem {
            add_pem_roots(&mut roots, pem, "inline trust roots")?;
        }

        Ok(roots)
    }
}

/// Match a suite by its rustls name; TLS 1.3 suites also match their IANA
/// spelling (`TLS_AES_128_GCM_SHA256`)
fn find_suite(available: &[SupportedCipherSuite], name: &str) -> Option<SupportedCipherSuite> {
    let wanted = name.trim();
    available.iter().copied().find(|suite| {
        let canonical = format!("{:?}", suite.suite());
        let iana = canonical.replacen("TLS13_", "TLS_", 1);
        canonical.eq_ignore_ascii_case(wanted) || iana.eq_ignore_ascii_case(wanted)
    })
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TlsError::CertificateNotFound { path: path.to_path_buf() }
        } else {
            TlsError::Io { path: path.to_path_buf(), source }
        }
    })
}

fn parse_certs(pem: &[u8], origin: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = Cursor::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Pem { origin: origin.to_string(), message: e.to_string() })?;

    if certs.is_empty() {
        return Err(TlsError::Pem {
            origin: origin.to_string(),
            message: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn add_pem_roots(roots: &mut RootCertStore, pem: &[u8], origin: &str) -> Result<(), TlsError> {
    let certs = parse_certs(pem, origin)?;
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(TlsError::Pem {
            origin: origin.to_string(),
            message: format!("no parsable certificates ({ignored} ignored)"),
        });
    }
    debug!(origin, added, ignored, "Added custom trust roots");
    Ok(())
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem = read_file(path)?;
    parse_certs(&pem, &path.display().to_string())
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let pem = read_file(path)?;
    let mut reader = BufReader::new(pem.as_slice());
    let origin = path.display().to_string();

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::Pem { origin: origin.clone(), message: e.to_string() })?
        .ok_or_else(|| TlsError::Pem { origin, message: "no private key found".to_string() })
}
