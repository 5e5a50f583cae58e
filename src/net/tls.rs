//! TLS configuration and certificate loading.
//!
//! Both listeners share one certificate chain and key. The HTTP/3 listener
//! negotiates ALPN `h3`; the TCP listener negotiates `h2` and `http/1.1`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicServerConfig;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::ResolvesServerCertUsingSni;
use rustls::sign::CertifiedKey;

use crate::config::TlsConfig;

/// ALPN protocol id for HTTP/3.
pub const ALPN_H3: &[u8] = b"h3";

/// Error type for TLS material and configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("certificate is not valid for server name {name:?}: {source}")]
    ServerName {
        name: String,
        #[source]
        source: rustls::Error,
    },
    #[error("tls error: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("tls configuration unusable for QUIC: {0}")]
    Quic(#[from] quinn::crypto::rustls::NoInitialCipherSuite),
    #[error("idle timeout out of range: {0}")]
    IdleTimeout(#[from] quinn::VarIntBoundsExceeded),
}

/// Certificate chain and private key loaded from PEM files.
#[derive(Debug)]
pub struct TlsMaterial {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl Clone for TlsMaterial {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
            key: self.key.clone_key(),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the certificate chain and private key named in `config`.
pub fn load_material(config: &TlsConfig) -> Result<TlsMaterial, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    let cert_pem = read(cert_path)?;
    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: cert_path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    let key_pem = read(key_path)?;
    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|source| TlsError::Read {
            path: key_path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.to_path_buf()))?;

    Ok(TlsMaterial { certs, key })
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Check that the certificate covers `server_name`.
///
/// IP-address identities are not checked.
pub fn verify_server_name(material: &TlsMaterial, server_name: &str) -> Result<(), TlsError> {
    if server_name.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    let provider = provider();
    let signing_key = provider
        .key_provider
        .load_private_key(material.key.clone_key())?;
    let certified = CertifiedKey::new(material.certs.clone(), signing_key);

    let mut resolver = ResolvesServerCertUsingSni::new();
    resolver
        .add(server_name, certified)
        .map_err(|source| TlsError::ServerName {
            name: server_name.to_string(),
            source,
        })
}

/// Build a rustls server config with the given ALPN protocols.
pub fn server_config(
    material: &TlsMaterial,
    alpn: &[&[u8]],
) -> Result<rustls::ServerConfig, TlsError> {
    let mut config = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(material.certs.clone(), material.key.clone_key())?;
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    Ok(config)
}

/// Build the QUIC server config for the HTTP/3 listener.
pub fn quic_server_config(
    material: &TlsMaterial,
    idle_timeout: Duration,
) -> Result<quinn::ServerConfig, TlsError> {
    let mut tls = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(material.certs.clone(), material.key.clone_key())?;
    tls.alpn_protocols = vec![ALPN_H3.to_vec()];

    let crypto = QuicServerConfig::try_from(tls)?;
    let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(crypto));

    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(quinn::IdleTimeout::try_from(idle_timeout)?));
    server_config.transport_config(Arc::new(transport));

    Ok(server_config)
}

/// Build the axum-server TLS config for the TCP listener.
pub fn tcp_server_config(
    material: &TlsMaterial,
) -> Result<axum_server::tls_rustls::RustlsConfig, TlsError> {
    let config = server_config(material, &[b"h2", b"http/1.1"])?;
    Ok(axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(config)))
}
