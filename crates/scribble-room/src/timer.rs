//! The per-room phase clock.
//!
//! A room's only autonomous actor. It is awaited inside the room actor's
//! `select!` loop next to the command queue, so a tick and an intent for
//! the same room never run concurrently.
//!
//! ```text
//!   paused ──(resume)──→ ticking ──(pause)──→ paused
//!                          │
//!                          └── wait() → elapsed periods (≥ 1)
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Most missed periods replayed after an overrun. Beyond that the clock
/// restarts from now.
const MAX_CATCH_UP: u32 = 5;

/// Fixed-period timer that can be paused.
///
/// [`wait`](Self::wait) is cancel-safe: it only updates its schedule after
/// the sleep completes, so dropping the future inside `select!` loses
/// nothing.
pub struct PhaseTimer {
    period: Duration,
    /// Extra delay applied to the first resume only.
    jitter: Duration,
    next_tick: Instant,
    paused: bool,
    tick_count: u64,
}

impl PhaseTimer {
    /// Creates a paused timer.
    ///
    /// The first tick after the first [`resume`](Self::resume) is delayed
    /// by a random `0..initial_jitter`.
    pub fn new(period: Duration, initial_jitter: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let jitter_us = u64::try_from(initial_jitter.as_micros()).unwrap_or(u64::MAX);
        let jitter = if jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..jitter_us))
        } else {
            Duration::ZERO
        };
        Self {
            period,
            jitter,
            next_tick: Instant::now() + period,
            paused: true,
            tick_count: 0,
        }
    }

    /// Waits for the next tick and returns how many periods elapsed.
    ///
    /// Normally `1`. After an overrun, the missed periods are returned too
    /// (up to [`MAX_CATCH_UP`] + 1) so game time keeps pace with the wall
    /// clock. Never resolves while paused.
    pub async fn wait(&mut self) -> u32 {
        if self.paused {
            std::future::pending::<()>().await;
        }

        time::sleep_until(self.next_tick).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(self.next_tick);
        let missed = u32::try_from(late_by.as_nanos() / self.period.as_nanos()).unwrap_or(u32::MAX);

        let elapsed = if missed > MAX_CATCH_UP {
            warn!(
                missed,
                late_ms = late_by.as_millis() as u64,
                "phase timer overrun, restarting from now"
            );
            self.next_tick = now + self.period;
            MAX_CATCH_UP + 1
        } else {
            if missed > 0 {
                warn!(missed, "phase timer overrun, catching up");
            }
            self.next_tick += self.period * (missed + 1);
            missed + 1
        };

        self.tick_count += u64::from(elapsed);
        trace!(tick = self.tick_count, elapsed, "phase tick");
        elapsed
    }

    /// Stops ticking. Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "phase timer paused");
        }
    }

    /// Starts ticking again, one full period from now. Idempotent: an
    /// already running timer keeps its schedule.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            let jitter = std::mem::take(&mut self.jitter);
            self.next_tick = Instant::now() + self.period + jitter;
            debug!(tick = self.tick_count, "phase timer resumed");
        }
    }

    /// Runs or pauses the timer depending on `running`.
    pub fn set_running(&mut self, running: bool) {
        if running {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total periods elapsed since creation.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn second() -> PhaseTimer {
        PhaseTimer::new(Duration::from_secs(1), Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_timer_is_paused_and_never_fires() {
        let mut timer = second();
        assert!(timer.is_paused());
        let fired = time::timeout(Duration::from_secs(10), timer.wait()).await;
        assert!(fired.is_err());
        assert_eq!(timer.tick_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_fires_once_per_period() {
        let mut timer = second();
        timer.resume();
        let start = Instant::now();

        assert_eq!(timer.wait().await, 1);
        assert_eq!(timer.wait().await, 1);

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(timer.tick_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_after_stall_reports_missed_periods() {
        let mut timer = second();
        timer.resume();
        time::advance(Duration::from_millis(3_500)).await;

        assert_eq!(timer.wait().await, 3);
        // Back on the original grid: next tick at t = 4 s.
        let before = Instant::now();
        assert_eq!(timer.wait().await, 1);
        assert_eq!(before.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_caps_catch_up() {
        let mut timer = second();
        timer.resume();
        time::advance(Duration::from_secs(60)).await;

        assert_eq!(timer.wait().await, MAX_CATCH_UP + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_resume_restarts_period() {
        let mut timer = second();
        timer.resume();
        timer.wait().await;

        timer.pause();
        assert!(time::timeout(Duration::from_secs(5), timer.wait()).await.is_err());

        timer.resume();
        let before = Instant::now();
        assert_eq!(timer.wait().await, 1);
        assert_eq!(before.elapsed(), Duration::from_secs(1));
    }
}
