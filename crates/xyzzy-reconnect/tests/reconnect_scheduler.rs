//! Integration tests for the reconnection scheduler.
//!
//! Timer tests run with a paused Tokio clock, so `sleep_until` resolves as
//! soon as the runtime has nothing else to do.

use std::time::Duration;

use tokio::time::Instant;
use xyzzy_reconnect::{ReconnectConfig, ReconnectScheduler, RetryKind};

// =========================================================================
// Helpers
// =========================================================================

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// The paused clock lands on the timer wheel's millisecond grid, so allow
/// a tick of slack.
fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(2),
        "elapsed {elapsed:?}, expected {expected:?}"
    );
}

fn config(initial: u64, max: u64) -> ReconnectConfig {
    ReconnectConfig {
        initial_interval: secs(initial),
        max_interval: secs(max),
    }
}

// =========================================================================
// ReconnectConfig
// =========================================================================

#[test]
fn test_default_config_is_one_to_thirty_seconds() {
    let cfg = ReconnectConfig::default();
    assert_eq!(cfg.initial_interval, secs(1));
    assert_eq!(cfg.max_interval, secs(30));
}

#[test]
fn test_delay_doubles_then_caps() {
    let cfg = ReconnectConfig::default();
    let delays: Vec<_> = (0..7).map(|k| cfg.delay_for(k)).collect();
    assert_eq!(
        delays,
        vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30), secs(30)]
    );
}

#[test]
fn test_delay_for_huge_attempt_count_is_max() {
    let cfg = ReconnectConfig::default();
    assert_eq!(cfg.delay_for(40), secs(30));
    assert_eq!(cfg.delay_for(u32::MAX), secs(30));
}

#[test]
fn test_validated_raises_max_to_initial() {
    let cfg = config(10, 5).validated();
    assert_eq!(cfg.max_interval, secs(10));
}

#[test]
fn test_validated_raises_zero_initial() {
    let cfg = ReconnectConfig {
        initial_interval: Duration::ZERO,
        max_interval: secs(1),
    }
    .validated();
    assert_eq!(cfg.initial_interval, ReconnectConfig::MIN_INTERVAL);
}

// =========================================================================
// Attempt bookkeeping
// =========================================================================

#[test]
fn test_first_schedule_after_healthy_connection_is_reconnect() {
    let mut s = ReconnectScheduler::new(ReconnectConfig::default());
    let plan = s.schedule();
    assert_eq!(plan.kind, RetryKind::Reconnect);
    assert_eq!(plan.delay, secs(1));
    assert_eq!(plan.attempts, 0);
    assert!(s.is_armed());
}

#[test]
fn test_schedule_after_failed_attempts_is_retry_with_backoff() {
    let mut s = ReconnectScheduler::new(ReconnectConfig::default());
    assert_eq!(s.record_attempt(), 1);
    let plan = s.schedule();
    assert_eq!(plan.kind, RetryKind::Retry);
    assert_eq!(plan.delay, secs(2));
    assert_eq!(plan.delay_secs(), 2);

    s.record_attempt();
    assert_eq!(s.schedule().delay, secs(4));
}

#[test]
fn test_reset_returns_to_reconnect() {
    let mut s = ReconnectScheduler::new(ReconnectConfig::default());
    s.record_attempt();
    s.record_attempt();
    s.reset();
    assert_eq!(s.attempts(), 0);
    assert_eq!(s.schedule().kind, RetryKind::Reconnect);
}

#[test]
fn test_delay_secs_rounds_up() {
    let mut s = ReconnectScheduler::new(ReconnectConfig {
        initial_interval: Duration::from_millis(1500),
        max_interval: secs(30),
    });
    assert_eq!(s.schedule().delay_secs(), 2);
}

// =========================================================================
// Timer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_retry_fires_after_delay() {
    let mut s = ReconnectScheduler::new(config(1, 30));
    s.record_attempt();
    let plan = s.schedule();

    let start = Instant::now();
    let kind = s.wait_for_retry().await;
    assert_eq!(kind, RetryKind::Retry);
    assert_elapsed(start, plan.delay);
    assert!(!s.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_retry_pends_when_not_armed() {
    let mut s = ReconnectScheduler::new(config(1, 30));
    let result = tokio::time::timeout(secs(3600), s.wait_for_retry()).await;
    assert!(result.is_err(), "unarmed scheduler must never fire");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_disarms_pending_wait() {
    let mut s = ReconnectScheduler::new(config(1, 30));
    s.schedule();
    s.cancel();
    assert!(!s.is_armed());
    let result = tokio::time::timeout(secs(60), s.wait_for_retry()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_schedule_replaces_pending_wait() {
    let mut s = ReconnectScheduler::new(config(1, 30));
    s.record_attempt();
    s.record_attempt();
    s.record_attempt();
    s.schedule(); // 8 s
    s.reset();
    s.schedule(); // 1 s, replaces the 8 s wait

    let start = Instant::now();
    assert_eq!(s.wait_for_retry().await, RetryKind::Reconnect);
    assert_elapsed(start, secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_stays_armed() {
    let mut s = ReconnectScheduler::new(config(5, 30));
    s.schedule();
    let early = tokio::time::timeout(secs(1), s.wait_for_retry()).await;
    assert!(early.is_err());
    assert!(s.is_armed());
    assert_eq!(s.wait_for_retry().await, RetryKind::Reconnect);
}
