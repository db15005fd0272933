//! Hyper-backed delegate transports.

use std::fmt;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::Connect;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::transport::{RoundTrip, TransportResult};

/// A pooled hyper-util client used as a [`RoundTrip`] delegate.
#[derive(Clone)]
pub struct HyperTransport<C> {
    client: Client<C, Body>,
}

impl<C> HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    /// HTTP/1.1 client (upgrades nothing, negotiates nothing).
    pub fn http1(connector: C) -> Self {
        Self::from_client(Client::builder(TokioExecutor::new()).build(connector))
    }

    /// Cleartext HTTP/2 client using prior knowledge.
    pub fn h2c(connector: C) -> Self {
        Self::from_client(
            Client::builder(TokioExecutor::new())
                .http2_only(true)
                .build(connector),
        )
    }

    /// Wrap a client built elsewhere, e.g. with custom pool settings.
    pub fn from_client(client: Client<C, Body>) -> Self {
        Self { client }
    }
}

impl<C> RoundTrip for HyperTransport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult> {
        let client = self.client.clone();
        Box::pin(async move {
            let response: Response<Incoming> = client.request(request).await?;
            let (parts, body) = response.into_parts();
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

impl<C> fmt::Debug for HyperTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}
