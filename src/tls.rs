use crate::config::ConfigError;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Certificate configuration for encrypted delivery.
///
/// Only needed when the collector must be verified against roots other
/// than the platform trust store.
#[derive(Clone)]
pub struct TlsConfig {
    client: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Use a fully preconfigured rustls client configuration.
    pub fn from_client_config(client: Arc<ClientConfig>) -> Self {
        Self { client }
    }

    /// Trust exactly the certificates contained in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let mut reader = pem;
        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| ConfigError::Tls(format!("invalid PEM bundle: {e}")))?;
            roots
                .add(cert)
                .map_err(|e| ConfigError::Tls(format!("invalid root certificate: {e}")))?;
        }
        if roots.is_empty() {
            return Err(ConfigError::Tls("no certificates found in PEM bundle".to_string()));
        }
        Ok(Self::from_client_config(Arc::new(client_config(roots)?)))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let pem = std::fs::read(path)
            .map_err(|e| ConfigError::Tls(format!("unable to read {}: {e}", path.display())))?;
        Self::from_pem(&pem)
    }

    /// Trust the platform's certificate store.
    #[cfg(feature = "native-roots")]
    pub fn native_roots() -> Result<Self, ConfigError> {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for err in &native.errors {
            tracing::debug!("error loading native certificates: {}", err);
        }
        for cert in native.certs {
            if let Err(err) = roots.add(cert) {
                tracing::debug!("skipping unparsable native certificate: {:?}", err);
            }
        }
        if roots.is_empty() {
            return Err(ConfigError::Tls(
                "no valid certificates found in native root store".to_string(),
            ));
        }
        Ok(Self::from_client_config(Arc::new(client_config(roots)?)))
    }

    #[cfg(not(feature = "native-roots"))]
    pub fn native_roots() -> Result<Self, ConfigError> {
        Err(ConfigError::Tls(
            "native-roots feature is disabled; supply a TlsConfig".to_string(),
        ))
    }

    pub(crate) fn connector(&self) -> TlsConnector {
        TlsConnector::from(Arc::clone(&self.client))
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig").finish_non_exhaustive()
    }
}

fn client_config(roots: RootCertStore) -> Result<ClientConfig, ConfigError> {
    let provider: Arc<CryptoProvider> = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(format!("unable to select protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}
