//! Certificate Prober.
//!
//! Opens a TLS connection to a monitored host and reads the "not valid
//! after" date of the leaf certificate the server presents. Chain
//! validation uses the Mozilla root set; revocation is not checked.
//!
//! There are no retries here. Every failure is surfaced as a
//! [`ProbeError`] and the caller decides what to do with it.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;
use x509_parser::prelude::*;

use crate::config::ProbeConfig;
use crate::errors::ProbeError;

/// Anything that can look up the certificate expiry for a service URL.
#[async_trait]
pub trait CertificateProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<NaiveDate, ProbeError>;
}

/// Extract the hostname from a scheme-qualified URL.
///
/// IPv6 literals are returned without brackets.
pub fn host_from_url(url: &str) -> Result<String, ProbeError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ProbeError::InvalidUrl(format!("{url}: {e}")))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ProbeError::InvalidUrl(format!("{url}: could not extract hostname")))?;

    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Read the "not valid after" field of a DER-encoded certificate as a UTC date.
pub fn expiry_from_der(der: &[u8]) -> Result<NaiveDate, ProbeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| ProbeError::ParseError(format!("failed to parse certificate: {e}")))?;

    let not_after = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(not_after, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| ProbeError::ParseError(format!("notAfter out of range: {not_after}")))
}

/// Prober that performs a real TCP + TLS handshake.
#[derive(Clone)]
pub struct TlsProber {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl TlsProber {
    /// Prober that trusts the Mozilla root set.
    pub fn new(config: &ProbeConfig) -> Result<Self, ProbeError> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(config, root_store)
    }

    /// Prober that trusts only the given roots.
    pub fn with_roots(config: &ProbeConfig, root_store: RootCertStore) -> Result<Self, ProbeError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::HandshakeError(format!("TLS configuration: {e}")))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
            port: config.port,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn connect(&self, host: &str) -> Result<TcpStream, ProbeError> {
        match timeout(self.timeout, TcpStream::connect((host, self.port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ProbeError::ConnectError(format!(
                "{host}:{}: {e}",
                self.port
            ))),
            Err(_) => Err(ProbeError::ConnectError(format!(
                "{host}:{}: timed out after {}s",
                self.port,
                self.timeout.as_secs()
            ))),
        }
    }
}

impl std::fmt::Debug for TlsProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsProber")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl CertificateProber for TlsProber {
    async fn probe(&self, url: &str) -> Result<NaiveDate, ProbeError> {
        let host = host_from_url(url)?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| ProbeError::InvalidUrl(format!("{host}: {e}")))?;

        let stream = self.connect(&host).await?;

        let tls_stream = match timeout(self.timeout, self.connector.connect(server_name, stream))
            .await
        {
            Ok(Ok(tls_stream)) => tls_stream,
            Ok(Err(e)) => return Err(ProbeError::HandshakeError(format!("{host}: {e}"))),
            Err(_) => {
                return Err(ProbeError::HandshakeError(format!(
                    "{host}: timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        let (_, connection) = tls_stream.get_ref();
        let leaf = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ProbeError::ParseError(format!("{host}: no certificate presented")))?;

        let expiry = expiry_from_der(leaf.as_ref())?;
        debug!(%host, %expiry, "read leaf certificate expiry");

        Ok(expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use rustls::ServerConfig;
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    struct TestCert {
        der: CertificateDer<'static>,
        key: Vec<u8>,
    }

    fn localhost_cert(not_after: (i32, u8, u8)) -> TestCert {
        let mut params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        TestCert {
            der: CertificateDer::from(cert.der().to_vec()),
            key: key_pair.serialize_der(),
        }
    }

    /// Accept a single TLS connection on loopback and return the port.
    async fn serve_once(cert: &TestCert) -> u16 {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![cert.der.clone()],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key.clone())),
            )
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let _ = acceptor.accept(stream).await;
            }
        });

        port
    }

    #[test]
    fn host_from_url_extracts_hostname() {
        assert_eq!(host_from_url("https://example.com").unwrap(), "example.com");
        assert_eq!(
            host_from_url("https://api.example.com:8443/health?x=1").unwrap(),
            "api.example.com"
        );
        assert_eq!(host_from_url("http://10.0.0.5/").unwrap(), "10.0.0.5");
        assert_eq!(host_from_url("https://[::1]:443/").unwrap(), "::1");
    }

    #[test]
    fn host_from_url_rejects_malformed_input() {
        assert!(matches!(
            host_from_url("not a url"),
            Err(ProbeError::InvalidUrl(_))
        ));
        assert!(matches!(host_from_url(""), Err(ProbeError::InvalidUrl(_))));
        assert!(matches!(
            host_from_url("mailto:ops@example.com"),
            Err(ProbeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn expiry_from_der_reads_not_after() {
        let mut params = rcgen::CertificateParams::new(vec!["example.com".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        params.not_after = rcgen::date_time_ymd(2031, 3, 14);
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        let expiry = expiry_from_der(cert.der()).unwrap();
        assert_eq!(expiry, NaiveDate::from_ymd_opt(2031, 3, 14).unwrap());
    }

    #[test]
    fn expiry_from_der_rejects_garbage() {
        assert!(matches!(
            expiry_from_der(b"definitely not DER"),
            Err(ProbeError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn probe_reports_invalid_url_without_connecting() {
        let prober = TlsProber::new(&ProbeConfig::default()).unwrap();
        let result = prober.probe("https://").await;
        assert!(matches!(result, Err(ProbeError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn probe_reports_refused_connection() {
        // Nothing listens on port 1 on loopback.
        let prober = TlsProber::new(&ProbeConfig {
            timeout_secs: 2,
            port: 1,
        })
        .unwrap();

        let result = prober.probe("https://127.0.0.1/").await;
        assert!(matches!(result, Err(ProbeError::ConnectError(_))));
    }

    #[tokio::test]
    async fn untrusted_certificate_is_a_handshake_error() {
        let cert = localhost_cert((2031, 3, 14));
        let port = serve_once(&cert).await;

        let prober = TlsProber::new(&ProbeConfig {
            timeout_secs: 3,
            port,
        })
        .unwrap();

        let result = prober.probe("https://localhost/").await;
        assert!(matches!(result, Err(ProbeError::HandshakeError(_))));
    }

    #[tokio::test]
    async fn trusted_certificate_yields_leaf_not_after_date() {
        let cert = localhost_cert((2031, 3, 14));
        let port = serve_once(&cert).await;

        let mut roots = RootCertStore::empty();
        roots.add(cert.der.clone()).unwrap();
        let prober = TlsProber::with_roots(
            &ProbeConfig {
                timeout_secs: 3,
                port,
            },
            roots,
        )
        .unwrap();

        let expiry = prober.probe("https://localhost/").await.unwrap();
        assert_eq!(expiry, NaiveDate::from_ymd_opt(2031, 3, 14).unwrap());
    }
}
