//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dial request:
//!     → backoff.rs (copy policy, start attempt-scoped delay sequence)
//!     → net::dialer (attempt, classify failure, sleep next delay)
//! ```
//!
//! # Design Decisions
//! - Policies are `Copy` values, never shared by reference
//! - Delay state lives in a per-call `Backoff`, not in the policy
//! - Jitter source is injectable so sequences can be reproduced

pub mod backoff;

pub use backoff::{Backoff, BackoffPolicy};
