//! Resilient network dialing and protocol-routing HTTP transports.
//!
//! - [`net`]: dial TCP (optionally TLS) with bounded exponential backoff
//! - [`http`]: route outgoing requests to an HTTP/1.1 or h2c transport
//! - [`resilience`]: backoff policies
//! - [`config`], [`observability`]: TOML config, logging and metrics

pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::DialerConfig;
pub use http::{AutoTransport, RoundTrip};
pub use net::{
    dial_tls_with_default_backoff, dial_with_backoff, dial_with_default_backoff, DialContext,
    DialError, DialErrorKind, Dialer,
};
pub use resilience::BackoffPolicy;
