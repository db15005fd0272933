//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net::dialer, http::auto produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every dial call gets a span carrying a unique dial ID
//! - Metrics are cheap (no-op without an installed recorder)

pub mod logging;
pub mod metrics;
