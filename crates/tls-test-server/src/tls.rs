//! TLS context construction from caller-supplied identity and trust material.
//!
//! Builds the `rustls::ServerConfig` the acceptor hands to every connection:
//! identity PEM parsing, cipher-suite / protocol-version restriction, and the
//! client-certificate verifier matching the resolved [`ClientAuthPolicy`].

use std::io::BufReader;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::policy::ClientAuthPolicy;

/// Build the server-side TLS context for `cfg`.
///
/// # Errors
///
/// Returns [`ServerError::Configuration`] if the identity or trust PEM is
/// unusable (no certificates, no key, mismatched pair), and
/// [`ServerError::TlsSetup`] if the cipher/protocol restrictions cannot be
/// satisfied by the rustls provider.
pub(crate) fn build_tls_config(
    cfg: &ServerConfig,
) -> Result<Arc<rustls::ServerConfig>, ServerError> {
    let certs = parse_certs(&cfg.cert_pem)?;
    if certs.is_empty() {
        return Err(ServerError::Configuration(
            "no certificates found in identity material".into(),
        ));
    }
    let key = parse_key(&cfg.key_pem)?;

    let provider = Arc::new(crypto_provider(cfg));
    let versions: &[&rustls::SupportedProtocolVersion] = if cfg.protocol_versions.is_empty() {
        rustls::ALL_VERSIONS
    } else {
        &cfg.protocol_versions
    };

    let builder = rustls::ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(versions)?;

    let builder = match cfg.client_auth_policy() {
        ClientAuthPolicy::None => builder.with_no_client_auth(),
        policy => {
            let roots = client_root_store(cfg)?;
            let mut verifier = WebPkiClientVerifier::builder_with_provider(roots, provider);
            if policy == ClientAuthPolicy::Requested {
                verifier = verifier.allow_unauthenticated();
            }
            let verifier = verifier.build().map_err(|e| {
                ServerError::Configuration(format!("client certificate verifier: {e}"))
            })?;
            builder.with_client_cert_verifier(verifier)
        }
    };

    let tls = builder.with_single_cert(certs, key).map_err(|e| {
        ServerError::Configuration(format!("certificate/key pair rejected: {e}"))
    })?;

    Ok(Arc::new(tls))
}

/// Provider with the cipher-suite allow-list applied. An explicit list
/// replaces the default set entirely; there is no fallback.
fn crypto_provider(cfg: &ServerConfig) -> CryptoProvider {
    let base = rustls::crypto::ring::default_provider();
    if cfg.cipher_suites.is_empty() {
        base
    } else {
        CryptoProvider {
            cipher_suites: cfg.cipher_suites.clone(),
            ..base
        }
    }
}

fn parse_certs(cert_pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    rustls_pemfile::certs(&mut BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Configuration(format!("failed to parse certificate chain: {e}")))
}

fn parse_key(key_pem: &[u8]) -> Result<PrivateKeyDer<'static>, ServerError> {
    rustls_pemfile::private_key(&mut BufReader::new(key_pem))
        .map_err(|e| ServerError::Configuration(format!("failed to read private key: {e}")))?
        .ok_or_else(|| ServerError::Configuration("no private key found in identity material".into()))
}

fn client_root_store(cfg: &ServerConfig) -> Result<Arc<RootCertStore>, ServerError> {
    let pem = cfg.trust_pem.as_deref().ok_or_else(|| {
        ServerError::Configuration("client authentication requires trust material".into())
    })?;

    let mut roots = RootCertStore::empty();
    for cert in parse_certs(pem)? {
        roots
            .add(cert)
            .map_err(|e| ServerError::Configuration(format!("invalid CA certificate: {e}")))?;
    }
    if roots.is_empty() {
        return Err(ServerError::Configuration(
            "no CA certificates found in trust material".into(),
        ));
    }
    Ok(Arc::new(roots))
}
