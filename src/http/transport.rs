//! The round-trip capability: one request in, one response out.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use thiserror::Error;

/// Error returned by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The hyper client failed to send the request or read the response.
    #[error("request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    /// Any other delegate-specific failure.
    #[error(transparent)]
    Other(Box<dyn StdError + Send + Sync>),
}

impl TransportError {
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        TransportError::Other(err.into())
    }
}

pub type TransportResult = Result<Response<Body>, TransportError>;

/// Sends one HTTP request and returns its response.
///
/// Implementations must be safe to call from many tasks at once.
pub trait RoundTrip: Send + Sync {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult>;
}

impl<T: RoundTrip + ?Sized> RoundTrip for Arc<T> {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult> {
        (**self).round_trip(request)
    }
}

impl<T: RoundTrip + ?Sized> RoundTrip for Box<T> {
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult> {
        (**self).round_trip(request)
    }
}

/// Adapter turning a closure into a [`RoundTrip`].
#[derive(Clone)]
pub struct RoundTripFn<F> {
    f: F,
}

/// Wrap `f(request)` as a transport.
pub fn round_trip_fn<F, Fut>(f: F) -> RoundTripFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = TransportResult> + Send + 'static,
{
    RoundTripFn { f }
}

impl<F, Fut> RoundTrip for RoundTripFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = TransportResult> + Send + 'static,
{
    fn round_trip(&self, request: Request<Body>) -> BoxFuture<'static, TransportResult> {
        Box::pin((self.f)(request))
    }
}

impl<F> fmt::Debug for RoundTripFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundTripFn").finish_non_exhaustive()
    }
}
