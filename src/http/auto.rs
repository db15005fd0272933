//! Protocol-version routing between two transports.
//!
//! ```text
//! request.version() == HTTP/2  → h2c transport
//! anything else                → default transport
//! ```
//!
//! Unknown versions go to the default transport so no request is dropped.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, Version};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::connect::Connect;
use tower::Service;

use crate::http::client::HyperTransport;
use crate::http::transport::{RoundTrip, TransportError, TransportResult};
use crate::observability::metrics;

/// Routes HTTP/2 requests to an h2c transport and everything else to a
/// default transport. Immutable after construction; clones share delegates.
#[derive(Clone)]
pub struct AutoTransport {
    default: Arc<dyn RoundTrip>,
    h2c: Arc<dyn RoundTrip>,
}

impl AutoTransport {
    pub fn new<D, H>(default: D, h2c: H) -> Self
    where
        D: RoundTrip + 'static,
        H: RoundTrip + 'static,
    {
        Self::from_shared(Arc::new(default), Arc::new(h2c))
    }

    /// Build from delegates that are also used elsewhere.
    pub fn from_shared(default: Arc<dyn RoundTrip>, h2c: Arc<dyn RoundTrip>) -> Self {
        Self { default, h2c }
    }

    /// HTTP/1.1 and h2c hyper clients sharing one connector.
    pub fn with_connector<C>(connector: C) -> Self
    where
        C: Connect + Clone + Send + Sync + 'static,
    {
        Self::new(
            HyperTransport::http1(connector.clone()),
            HyperTransport::h2c(connector),
        )
    }

    fn select(&self, version: Version) -> (&'static str, &Arc<dyn RoundTrip>) {
        if version == Version::HTTP_2 {
            ("h2c", &self.h2c)
        } else {
            ("default", &self.default)
        }
    }
}

impl RoundTrip for AutoTransport {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult> {
        let (name, transport) = self.select(request.version());
        tracing::trace!(version = ?request.version(), transport = name, "Routing request");
        metrics::record_transport_request(name);
        transport.round_trip(request)
    }
}

impl Service<Request<Body>> for AutoTransport {
    type Response = Response<Body>;
    type Error = TransportError;
    type Future = BoxFuture<'static, TransportResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        self.round_trip(request)
    }
}

impl std::fmt::Debug for AutoTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTransport").finish_non_exhaustive()
    }
}
