//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing request
//!     → auto.rs (inspect version, pick delegate)
//!         → client.rs (HyperTransport: HTTP/1.1 or h2c hyper client)
//!             → net::BackoffConnector (dial with backoff)
//!     → Response handed back unchanged
//! ```
//!
//! # Design Decisions
//! - Delegates are `RoundTrip` trait objects so tests can swap in fakes
//! - The router never touches the request; it only picks a delegate
//! - No pooling or locking of our own; hyper clients pool internally

pub mod auto;
pub mod client;
pub mod transport;

pub use auto::AutoTransport;
pub use client::HyperTransport;
pub use transport::{round_trip_fn, RoundTrip, RoundTripFn, TransportError, TransportResult};
