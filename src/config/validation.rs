//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges. All problems are
//! reported together rather than stopping at the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::DialerConfig;

/// A single semantic problem with a config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `backoff.steps`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint on `config`.
pub fn validate_config(config: &DialerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let backoff = &config.backoff;
    if backoff.steps == 0 {
        errors.push(ValidationError::new("backoff.steps", "must be at least 1"));
    }
    if !backoff.factor.is_finite() || backoff.factor < 1.0 {
        errors.push(ValidationError::new("backoff.factor", "must be a finite number >= 1.0"));
    }
    if !(0.0..1.0).contains(&backoff.jitter) {
        errors.push(ValidationError::new("backoff.jitter", "must be in [0, 1)"));
    }
    if backoff.cap_ms < backoff.initial_delay_ms {
        errors.push(ValidationError::new(
            "backoff.cap_ms",
            format!("must not be below initial_delay_ms ({})", backoff.initial_delay_ms),
        ));
    }

    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::new("timeouts.attempt_ms", "must be greater than 0"));
    }

    if config.tls.server_name.is_some() && config.tls.ca_file.is_none() {
        errors.push(ValidationError::new("tls.server_name", "requires tls.ca_file"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
