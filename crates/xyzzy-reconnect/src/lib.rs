//! Exponential-backoff reconnection scheduler for xyzzy.
//!
//! After a connection is lost the client waits, dials again, and repeats
//! with a doubling delay until a handshake succeeds:
//!
//! ```text
//! delay(k) = min(max_interval, initial_interval * 2^k)
//! ```
//!
//! `k` is the number of attempts made since the last successful handshake.
//! The first wait after a healthy connection drops (`k == 0`) is a plain
//! reconnect; every later wait is a retry.
//!
//! # Integration
//!
//! The scheduler sits inside the connection task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle commands */ }
//!         kind = scheduler.wait_for_retry() => {
//!             scheduler.record_attempt();
//!             dial(kind);
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Backoff timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect. Default: 1 s.
    pub initial_interval: Duration,
    /// Upper bound for any delay. Default: 30 s.
    pub max_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    /// Smallest delay the scheduler will use.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`ReconnectScheduler::new`]. Rules:
    /// - `initial_interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - `max_interval` raised to at least `initial_interval`.
    pub fn validated(mut self) -> Self {
        if self.initial_interval < Self::MIN_INTERVAL {
            warn!(
                initial_ms = self.initial_interval.as_millis() as u64,
                "initial_interval below minimum; raising"
            );
            self.initial_interval = Self::MIN_INTERVAL;
        }
        if self.max_interval < self.initial_interval {
            warn!(
                max_ms = self.max_interval.as_millis() as u64,
                initial_ms = self.initial_interval.as_millis() as u64,
                "max_interval below initial_interval; raising"
            );
            self.max_interval = self.initial_interval;
        }
        self
    }

    /// The delay before the attempt that follows `attempts` earlier ones.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        2u32.checked_pow(attempts)
            .and_then(|factor| self.initial_interval.checked_mul(factor))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// Whether a scheduled wait follows a healthy connection or a failed dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// First wait after a connection that had completed its handshake.
    Reconnect,
    /// Wait after one or more attempts that did not reach a handshake.
    Retry,
}

/// A wait that was just armed by [`ReconnectScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub kind: RetryKind,
    pub delay: Duration,
    /// Attempts made since the last successful handshake.
    pub attempts: u32,
}

impl RetryPlan {
    /// The delay in whole seconds, rounded up.
    pub fn delay_secs(&self) -> u64 {
        let secs = self.delay.as_secs();
        if self.delay.subsec_nanos() > 0 { secs + 1 } else { secs }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Reconnection timer with attempt bookkeeping.
///
/// At most one wait is armed at a time; scheduling again replaces it.
#[derive(Debug)]
pub struct ReconnectScheduler {
    config: ReconnectConfig,
    attempts: u32,
    /// When the armed wait fires, and what kind it is.
    pending: Option<(Instant, RetryKind)>,
}

impl ReconnectScheduler {
    pub fn new(config: ReconnectConfig) -> Self {
        let config = config.validated();
        debug!(
            initial_ms = config.initial_interval.as_millis() as u64,
            max_ms = config.max_interval.as_millis() as u64,
            "reconnect scheduler created"
        );
        Self {
            config,
            attempts: 0,
            pending: None,
        }
    }

    /// Counts one connection attempt and returns the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Forgets past attempts. Call once a handshake succeeds.
    pub fn reset(&mut self) {
        if self.attempts > 0 {
            debug!(attempts = self.attempts, "reconnect attempts reset");
        }
        self.attempts = 0;
    }

    /// Arms the next wait, replacing any wait already armed.
    pub fn schedule(&mut self) -> RetryPlan {
        let kind = if self.attempts == 0 {
            RetryKind::Reconnect
        } else {
            RetryKind::Retry
        };
        let delay = self.config.delay_for(self.attempts);
        self.pending = Some((Instant::now() + delay, kind));
        debug!(?kind, attempts = self.attempts, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        RetryPlan {
            kind,
            delay,
            attempts: self.attempts,
        }
    }

    /// Disarms the pending wait, if any.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            debug!("pending reconnect cancelled");
        }
    }

    /// Wait until the armed delay elapses and return its kind.
    ///
    /// When nothing is armed this future pends forever, so the surrounding
    /// `tokio::select!` keeps serving its other branches. Dropping the
    /// future before it completes leaves the wait armed.
    pub async fn wait_for_retry(&mut self) -> RetryKind {
        let Some((deadline, kind)) = self.pending else {
            return std::future::pending::<RetryKind>().await;
        };
        time::sleep_until(deadline).await;
        self.pending = None;
        kind
    }

    /// Whether a wait is armed.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Attempts made since the last successful handshake.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The active configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}
