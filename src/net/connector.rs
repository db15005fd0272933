//! Backoff dialing as a hyper-util connector.
//!
//! Lets a legacy `Client` open every pooled connection through
//! [`Dialer`], so HTTP traffic inherits the retry behaviour.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Uri;
use futures_util::future::BoxFuture;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::Service;

use crate::net::context::DialContext;
use crate::net::dialer::{Dialer, Network};
use crate::net::error::DialError;

/// `tower::Service<Uri>` that dials the URI authority with backoff.
#[derive(Debug, Clone)]
pub struct BackoffConnector {
    dialer: Arc<Dialer>,
    network: Network,
    ctx: DialContext,
}

impl BackoffConnector {
    pub fn new(dialer: Dialer) -> Self {
        Self {
            dialer: Arc::new(dialer),
            network: Network::Tcp,
            ctx: DialContext::background(),
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Abort in-flight dials when `ctx` is done, e.g. on shutdown.
    pub fn with_context(mut self, ctx: DialContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }
}

impl Default for BackoffConnector {
    fn default() -> Self {
        Self::new(Dialer::new())
    }
}

/// `host:port` for a request URI, defaulting the port from the scheme.
pub(crate) fn authority_address(uri: &Uri) -> Result<String, DialError> {
    let host = uri.host().ok_or_else(|| DialError::InvalidAddress {
        address: uri.to_string(),
        reason: "URI has no host".to_string(),
    })?;
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("https") => 443,
        _ => 80,
    });
    // `Uri::host` keeps IPv6 brackets.
    Ok(format!("{host}:{port}"))
}

impl Service<Uri> for BackoffConnector {
    type Response = TokioIo<TcpStream>;
    type Error = DialError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let this = self.clone();
        Box::pin(async move {
            let address = authority_address(&uri)?;
            let stream = this.dialer.dial(&this.ctx, this.network, &address).await?;
            Ok(TokioIo::new(stream.into_inner()))
        })
    }
}
