//! mTLS client configuration, grounded in the inline
//! `ClientContextFactory` of `original_source/tcp/tcp_client.py`
//! (`use_certificate_file`, `use_privatekey_file`,
//! `load_verify_locations`, `VERIFY_PEER`), rebuilt on `rustls` rather
//! than OpenSSL per the rustls-first convention visible across the pack.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::config::AppConfig;

/// Builds the `rustls` client config used to dial every device:
/// the client's own cert+key for mutual authentication, and a root
/// store seeded only with the configured CA (devices are not expected
/// to chain to a public root).
pub fn build_connector(config: &AppConfig) -> Result<TlsConnector> {
    let cert_chain = load_cert_chain(&config.client_cert_path)
        .with_context(|| format!("loading client cert from {}", config.client_cert_path))?;
    let key = load_private_key(&config.client_key_path)
        .with_context(|| format!("loading client key from {}", config.client_key_path))?;
    let root_store = load_root_store(&config.ca_cert_path)
        .with_context(|| format!("loading CA bundle from {}", config.ca_cert_path))?;

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(cert_chain, key)
        .context("building rustls client config")?;

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

fn load_cert_chain(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .context("no private key found in PEM file")
}

fn load_root_store(ca_path: &str) -> Result<RootCertStore> {
    let file = File::open(ca_path)?;
    let mut reader = BufReader::new(file);
    let mut store = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut reader) {
        store.add(cert?)?;
    }
    Ok(store)
}
