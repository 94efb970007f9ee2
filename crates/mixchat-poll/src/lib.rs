//! Cancellable fixed-cadence poller for mixchat.
//!
//! The relay never pushes messages; the engine has to ask for them. A
//! [`Poller`] produces one value per interval (the engine produces a fetch
//! request) until it is stopped.
//!
//! # Integration
//!
//! The poller is designed to sit inside a connection actor's `tokio::select!`
//! loop. While stopped, [`Poller::next_tick`] pends forever, so the branch is
//! simply never taken:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         frame = conn.recv() => { /* dispatch */ }
//!         request = poller.next_tick() => { /* send request */ }
//!     }
//! }
//! ```
//!
//! Ticks fire regardless of whether earlier requests were answered. There is
//! no backpressure: a slow relay just sees requests queue up on the socket.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// The engine's polling cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Errors from misusing the poller. These are caller contract violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// `start` was called while the poller was already running.
    #[error("poller already started; stop it first")]
    AlreadyStarted,

    /// A zero interval would spin.
    #[error("poll interval must be non-zero")]
    ZeroInterval,
}

struct Armed<T> {
    interval: Duration,
    next_tick: Instant,
    on_tick: Box<dyn FnMut() -> T + Send + Sync>,
}

/// A repeating timer that yields `on_tick()` every interval while running.
///
/// ```text
///   Stopped ──start()──→ Running ──stop()──→ Stopped
///      ↑                    │
///      └──────stop()────────┘ (stop is idempotent)
/// ```
pub struct Poller<T> {
    armed: Option<Armed<T>>,
    tick_count: u64,
    ticks_skipped: u64,
}

impl<T> Poller<T> {
    /// Creates a stopped poller.
    pub fn new() -> Self {
        Self {
            armed: None,
            tick_count: 0,
            ticks_skipped: 0,
        }
    }

    /// Starts firing `on_tick` every `interval`.
    ///
    /// The first tick is due one full interval from now, never sooner.
    ///
    /// # Errors
    /// - [`PollError::AlreadyStarted`] if the poller is running
    /// - [`PollError::ZeroInterval`] if `interval` is zero
    pub fn start(
        &mut self,
        interval: Duration,
        on_tick: impl FnMut() -> T + Send + Sync + 'static,
    ) -> Result<(), PollError> {
        if self.armed.is_some() {
            return Err(PollError::AlreadyStarted);
        }
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }

        self.armed = Some(Armed {
            interval,
            next_tick: Instant::now() + interval,
            on_tick: Box::new(on_tick),
        });
        debug!(interval_ms = millis(interval), "poller started");
        Ok(())
    }

    /// Cancels all future ticks. Safe to call when never started.
    pub fn stop(&mut self) {
        if self.armed.take().is_some() {
            debug!(ticks = self.tick_count, "poller stopped");
        }
    }

    /// Waits for the next tick and returns what `on_tick` produced.
    ///
    /// Pends forever while stopped. Cancel-safe: dropping the future before
    /// it resolves leaves the schedule untouched.
    pub async fn next_tick(&mut self) -> T {
        let Some(armed) = self.armed.as_mut() else {
            // Never completes; select! keeps servicing the other branches.
            std::future::pending::<()>().await;
            unreachable!()
        };

        let due = armed.next_tick;
        time::sleep_until(due).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(due);
        let missed = u64::try_from(late_by.as_nanos() / armed.interval.as_nanos())
            .unwrap_or(u64::MAX);
        if missed > 0 {
            warn!(
                tick = self.tick_count + 1,
                missed,
                late_ms = millis(late_by),
                "poller woke late, skipping missed ticks"
            );
            self.ticks_skipped = self.ticks_skipped.saturating_add(missed);
        }
        armed.next_tick = next_on_grid(due, armed.interval, missed, now);

        self.tick_count += 1;
        trace!(tick = self.tick_count, "poll tick");
        (armed.on_tick)()
    }

    /// Whether the poller is currently running.
    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }

    /// Ticks fired since creation (across restarts).
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Ticks skipped because the task woke up late.
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped
    }

    /// The current interval, or `None` while stopped.
    pub fn interval(&self) -> Option<Duration> {
        self.armed.as_ref().map(|a| a.interval)
    }
}

/// The tick after `due` once `missed` ticks are skipped. Stays on the
/// original cadence and never bursts to catch up. A stall too long to count
/// restarts the cadence from `now`.
fn next_on_grid(due: Instant, interval: Duration, missed: u64, now: Instant) -> Instant {
    u32::try_from(missed.saturating_add(1))
        .ok()
        .and_then(|steps| interval.checked_mul(steps))
        .and_then(|step| due.checked_add(step))
        .unwrap_or_else(|| now + interval)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<T> Default for Poller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Poller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval())
            .field("tick_count", &self.tick_count)
            .field("ticks_skipped", &self.ticks_skipped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_poller_is_stopped() {
        let p: Poller<()> = Poller::new();
        assert!(!p.is_running());
        assert_eq!(p.tick_count(), 0);
        assert_eq!(p.interval(), None);
    }

    #[tokio::test]
    async fn test_start_twice_is_error() {
        let mut p = Poller::new();
        p.start(DEFAULT_INTERVAL, || ()).unwrap();
        assert_eq!(
            p.start(DEFAULT_INTERVAL, || ()),
            Err(PollError::AlreadyStarted)
        );
        // The original schedule survives the failed call.
        assert_eq!(p.interval(), Some(DEFAULT_INTERVAL));
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let mut p = Poller::new();
        assert_eq!(
            p.start(Duration::ZERO, || ()),
            Err(PollError::ZeroInterval)
        );
        assert!(!p.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_on_grid_skips_missed_ticks() {
        let due = Instant::now();
        let interval = Duration::from_millis(100);
        let now = due + Duration::from_millis(250);
        assert_eq!(
            next_on_grid(due, interval, 2, now),
            due + Duration::from_millis(300)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_on_grid_survives_uncountable_stalls() {
        let due = Instant::now();
        let interval = Duration::from_millis(100);
        let now = due + Duration::from_secs(5);
        assert_eq!(next_on_grid(due, interval, u64::from(u32::MAX), now), now + interval);
        assert_eq!(next_on_grid(due, interval, u64::MAX, now), now + interval);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut p: Poller<()> = Poller::new();
        p.stop();
        p.stop();
        assert!(!p.is_running());
    }
}
