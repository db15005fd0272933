//! Cancellation and deadlines for dial operations.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`DialContext`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneCause {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for DoneCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoneCause::Cancelled => write!(f, "context cancelled"),
            DoneCause::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline, checked at every suspension
/// point of a dial.
#[derive(Debug, Clone)]
pub struct DialContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl DialContext {
    /// A context that is never done unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Wrap an existing token, e.g. a service-wide shutdown token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Copy of this context that also expires after `timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Copy of this context that also expires at `deadline`. An earlier
    /// existing deadline wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Child context: cancelled with its parent, but cancelling it leaves the
    /// parent untouched.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn cause(&self) -> Option<DoneCause> {
        if self.token.is_cancelled() {
            return Some(DoneCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DoneCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn done(&self) -> DoneCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => DoneCause::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => DoneCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                DoneCause::Cancelled
            }
        }
    }
}

impl Default for DialContext {
    fn default() -> Self {
        Self::background()
    }
}
