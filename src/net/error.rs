//! Dial error types.
//!
//! Messages carry stable markers so callers can classify by substring:
//! `"connection refused"` for refusals and `"timed out dialing"` for
//! timeouts. [`DialError::kind`] gives the same answer as a typed value.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::net::context::DoneCause;

/// Coarse classification of a dial failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialErrorKind {
    /// Remote actively rejected the connection.
    Refused,
    /// An attempt exceeded its time allowance.
    TimedOut,
    /// The dial context finished first.
    Cancelled,
    /// Anything else: DNS, unreachable network, TLS, bad input.
    Other,
}

impl DialErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialErrorKind::Refused => "refused",
            DialErrorKind::TimedOut => "timed_out",
            DialErrorKind::Cancelled => "cancelled",
            DialErrorKind::Other => "other",
        }
    }
}

/// Errors returned by the backoff dialer.
#[derive(Debug, Error)]
pub enum DialError {
    /// Nothing accepted the connection.
    #[error("connection refused dialing {address}: {source}")]
    Refused {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Connect (and handshake, when TLS is on) did not finish in time.
    #[error("timed out dialing {address} after {timeout:?}")]
    TimedOut { address: String, timeout: Duration },

    /// The context was cancelled or hit its deadline.
    #[error("dialing {address} aborted: {cause}")]
    Cancelled { address: String, cause: DoneCause },

    /// TLS handshake failed after TCP connected.
    #[error("tls handshake with {address} failed: {source}")]
    Tls {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Any other transport-level failure.
    #[error("failed dialing {address}: {source}")]
    Io {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Network family is not one of tcp, tcp4, tcp6.
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),

    /// Address or server name could not be parsed.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Every attempt failed.
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<DialError> },
}

impl DialError {
    /// Classify an I/O error from a single connect attempt.
    ///
    /// `timeout` is the allowance the attempt was given; an OS-level
    /// `ETIMEDOUT` is reported against it.
    pub(crate) fn from_io(address: &str, source: io::Error, timeout: Duration) -> Self {
        let address = address.to_string();
        match source.kind() {
            io::ErrorKind::ConnectionRefused => DialError::Refused { address, source },
            io::ErrorKind::TimedOut => DialError::TimedOut { address, timeout },
            _ => DialError::Io { address, source },
        }
    }

    pub fn kind(&self) -> DialErrorKind {
        match self {
            DialError::Refused { .. } => DialErrorKind::Refused,
            DialError::TimedOut { .. } => DialErrorKind::TimedOut,
            DialError::Cancelled { .. } => DialErrorKind::Cancelled,
            DialError::Exhausted { last, .. } => last.kind(),
            DialError::Tls { .. }
            | DialError::Io { .. }
            | DialError::UnsupportedNetwork(_)
            | DialError::InvalidAddress { .. } => DialErrorKind::Other,
        }
    }

    pub fn is_refused(&self) -> bool {
        self.kind() == DialErrorKind::Refused
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == DialErrorKind::TimedOut
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == DialErrorKind::Cancelled
    }

    /// Number of attempts made, when the error is the result of exhaustion.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            DialError::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

impl From<DialError> for io::Error {
    fn from(err: DialError) -> Self {
        let kind = match err.kind() {
            DialErrorKind::Refused => io::ErrorKind::ConnectionRefused,
            DialErrorKind::TimedOut => io::ErrorKind::TimedOut,
            DialErrorKind::Cancelled => io::ErrorKind::Interrupted,
            DialErrorKind::Other => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
