//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML, and every
//! field has a default so an empty file is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::BackoffPolicy;

/// Root configuration for the dialer and transports.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DialerConfig {
    /// Retry timing for dials.
    pub backoff: BackoffConfig,

    /// Per-attempt timeouts.
    pub timeouts: TimeoutConfig,

    /// TLS client settings.
    pub tls: TlsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backoff configuration. Mirrors [`BackoffPolicy::DEFAULT`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Maximum number of dial attempts.
    pub steps: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,

    /// Random extra fraction added to each delay, in [0, 1).
    pub jitter: f64,

    /// Upper bound on the un-jittered delay in milliseconds.
    pub cap_ms: u64,
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.steps,
            Duration::from_millis(self.initial_delay_ms),
            self.factor,
            self.jitter,
            Duration::from_millis(self.cap_ms),
        )
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::DEFAULT;
        Self {
            steps: policy.steps(),
            initial_delay_ms: policy.initial_delay().as_millis() as u64,
            factor: policy.factor(),
            jitter: policy.jitter(),
            cap_ms: policy.cap().as_millis() as u64,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Allowance for one connect (plus TLS handshake) in milliseconds.
    pub attempt_ms: u64,
}

impl TimeoutConfig {
    pub fn attempt(&self) -> Duration {
        Duration::from_millis(self.attempt_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { attempt_ms: 1000 }
    }
}

/// TLS client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to a PEM bundle of trusted root certificates.
    pub ca_file: Option<String>,

    /// Name to verify the server certificate against, instead of the dialed host.
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// Overlay command-line values; each unset one keeps the configured value.
    pub fn with_overrides(&self, ca_file: Option<String>, server_name: Option<String>) -> Self {
        Self {
            ca_file: ca_file.or_else(|| self.ca_file.clone()),
            server_name: server_name.or_else(|| self.server_name.clone()),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Pretty for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
