//! TLS client configuration and handshakes for dialed connections.

use std::fmt;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::schema::TlsConfig;
use crate::net::error::DialError;

/// Error type for building TLS settings.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM data: {0}")]
    Pem(#[source] std::io::Error),

    #[error("no certificates found in PEM data")]
    NoCertificates,

    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
}

/// Client-side TLS settings applied after every successful TCP connect.
#[derive(Clone)]
pub struct TlsSettings {
    connector: TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl TlsSettings {
    /// Use a prepared rustls client configuration.
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
            server_name: None,
        }
    }

    /// Trust exactly the certificates in `pem`.
    pub fn from_root_pem(pem: &[u8]) -> Result<Self, TlsError> {
        let mut root_store = RootCertStore::empty();
        let mut reader = BufReader::new(pem);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(TlsError::Pem)?;
            root_store.add(cert)?;
        }
        if root_store.is_empty() {
            return Err(TlsError::NoCertificates);
        }

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self::new(Arc::new(config)))
    }

    /// Trust the certificates in a PEM file.
    pub async fn from_root_file(path: &Path) -> Result<Self, TlsError> {
        let pem = tokio::fs::read(path).await.map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_root_pem(&pem)
    }

    /// Build settings from the `[tls]` config section.
    ///
    /// Returns `Ok(None)` when no CA file is configured.
    pub async fn from_config(config: &TlsConfig) -> Result<Option<Self>, TlsError> {
        let Some(ca_file) = &config.ca_file else {
            return Ok(None);
        };
        let mut settings = Self::from_root_file(Path::new(ca_file)).await?;
        if let Some(name) = &config.server_name {
            settings = settings.with_server_name(name)?;
        }
        Ok(Some(settings))
    }

    /// Verify the peer against `name` instead of the dialed host.
    pub fn with_server_name(mut self, name: &str) -> Result<Self, TlsError> {
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|_| TlsError::InvalidServerName(name.to_string()))?;
        self.server_name = Some(server_name);
        Ok(self)
    }

    pub fn server_name(&self) -> Option<&ServerName<'static>> {
        self.server_name.as_ref()
    }

    fn server_name_for(&self, address: &str, host: &str) -> Result<ServerName<'static>, DialError> {
        if let Some(name) = &self.server_name {
            return Ok(name.clone());
        }
        ServerName::try_from(host.to_string()).map_err(|_| DialError::InvalidAddress {
            address: address.to_string(),
            reason: format!("{host:?} is not a valid TLS server name"),
        })
    }

    /// Run the client handshake over an already connected stream.
    ///
    /// On failure the stream is dropped, closing the socket.
    pub async fn handshake<S>(
        &self,
        stream: S,
        address: &str,
        host: &str,
    ) -> Result<TlsStream<S>, DialError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.server_name_for(address, host)?;
        self.connector
            .connect(server_name, stream)
            .await
            .map_err(|source| DialError::Tls {
                address: address.to_string(),
                source,
            })
    }
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}
