//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! dial_with_backoff(ctx, network, address, policy, tls)
//!     → dialer.rs (attempt loop, backoff sleeps, classification)
//!         → Dial primitive (TcpDial: resolve + connect)
//!         → tls.rs (optional handshake)
//!     → stream.rs (DialedStream handed to caller)
//!
//! connector.rs adapts the dialer into a hyper-util connector.
//! ```
//!
//! # Design Decisions
//! - Every suspension point races the DialContext
//! - Failed attempts drop their socket before the next one starts
//! - Refused vs timed out is decided from io::ErrorKind, never message text

pub mod connector;
pub mod context;
pub mod dialer;
pub mod error;
pub mod stream;
pub mod tls;

pub use connector::BackoffConnector;
pub use context::{DialContext, DoneCause};
pub use dialer::{
    dial_fn, dial_tls_with_default_backoff, dial_with_backoff, dial_with_default_backoff, Dial,
    DialFn, Dialer, Network, TcpDial,
};
pub use error::{DialError, DialErrorKind};
pub use stream::{Connection, DialedStream};
pub use tls::{TlsError, TlsSettings};
