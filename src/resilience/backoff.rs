//! Exponential backoff with jitter.
//!
//! A [`BackoffPolicy`] is plain `Copy` data. Each dial operation calls
//! [`BackoffPolicy::backoff`] to get its own [`Backoff`], so the attempt
//! counter never leaks between concurrent callers.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Retry timing for a single dial operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    steps: u32,
    initial_delay: Duration,
    factor: f64,
    jitter: f64,
    cap: Duration,
}

impl BackoffPolicy {
    /// Template used by the default dial entry points.
    ///
    /// 15 attempts starting at 50ms, growing by 1.4x with 10% jitter.
    pub const DEFAULT: BackoffPolicy = BackoffPolicy {
        steps: 15,
        initial_delay: Duration::from_millis(50),
        factor: 1.4,
        jitter: 0.1,
        cap: Duration::from_secs(5),
    };

    /// Build a policy, clamping every field into its valid range.
    pub fn new(
        steps: u32,
        initial_delay: Duration,
        factor: f64,
        jitter: f64,
        cap: Duration,
    ) -> Self {
        Self::DEFAULT
            .with_steps(steps)
            .with_initial_delay(initial_delay)
            .with_factor(factor)
            .with_jitter(jitter)
            .with_cap(cap)
    }

    /// Copy of this policy allowing `steps` attempts (at least one).
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Copy of this policy with a growth factor; values below 1.0 become 1.0.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Copy of this policy with a jitter fraction clamped into `[0, 1)`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() { jitter.clamp(0.0, 0.99) } else { 0.0 };
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Maximum number of attempts.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Start a fresh delay sequence seeded from the OS.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(*self, StdRng::from_entropy())
    }

    /// Start a delay sequence with a fixed seed, for reproducible jitter.
    pub fn backoff_seeded(&self, seed: u64) -> Backoff {
        Backoff::new(*self, StdRng::seed_from_u64(seed))
    }

    /// Upper bound on the total time spent sleeping across all retries.
    pub fn max_total_delay(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut delay = self.initial_delay.min(self.cap);
        for _ in 1..self.steps {
            total = total.saturating_add(scale(delay, 1.0 + self.jitter));
            delay = grow(delay, self.factor, self.cap);
        }
        total
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Attempt-scoped delay sequence.
///
/// Yields the delay to wait after each failed attempt, so a policy with
/// `steps = n` yields at most `n - 1` delays.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
    retries_left: u32,
    rng: StdRng,
}

impl Backoff {
    fn new(policy: BackoffPolicy, rng: StdRng) -> Self {
        Self {
            policy,
            next: policy.initial_delay.min(policy.cap),
            retries_left: policy.steps.saturating_sub(1),
            rng,
        }
    }

    /// Policy this sequence was created from.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Retries still available.
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Next delay, or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }
        self.retries_left -= 1;

        let base = self.next;
        self.next = grow(base, self.policy.factor, self.policy.cap);

        Some(self.jittered(base))
    }

    fn jittered(&mut self, base: Duration) -> Duration {
        if self.policy.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let extra = self.rng.gen_range(0.0..self.policy.jitter);
        base.saturating_add(scale(base, extra))
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.next_delay()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.retries_left as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Backoff {}

fn grow(delay: Duration, factor: f64, cap: Duration) -> Duration {
    scale(delay, factor).min(cap)
}

/// `delay * factor`, saturating at `Duration::MAX`.
fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
