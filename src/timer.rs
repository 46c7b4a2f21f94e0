//! The single retransmission timer.
//!
//! The sender keeps exactly one timer: it is armed if and only if at least
//! one DATA segment is unacknowledged, and it always tracks the oldest
//! unacked segment.  Rather than spawning a short-lived task per
//! retransmission, [`RetransmitTimer`] owns one `tokio::time::Sleep` whose
//! deadline is reset on every arm; a disarmed timer is parked a year in the
//! future behind an `is_armed` guard, so a stale deadline can never fire.
//!
//! Usage inside `tokio::select!`:
//!
//! ```ignore
//! tokio::select! {
//!     _ = timer.expired(), if timer.is_armed() => { /* retransmit oldest */ }
//!     ev = events.recv() => { /* ... */ }
//! }
//! ```

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Deadline used while disarmed; never reached in practice.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

/// A resettable one-shot deadline for the oldest unacknowledged segment.
#[derive(Debug)]
pub struct RetransmitTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RetransmitTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(FAR_FUTURE)),
            armed: false,
        }
    }

    /// Arm (or re-arm) the timer to expire `timeout` from now.
    pub fn arm(&mut self, timeout: Duration) {
        self.sleep.as_mut().reset(Instant::now() + timeout);
        self.armed = true;
    }

    /// Disarm the timer; pending deadlines are retired.
    pub fn disarm(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + FAR_FUTURE);
        self.armed = false;
    }

    /// `true` while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Completes when the armed deadline expires.
    ///
    /// Callers must guard with [`is_armed`](Self::is_armed) in `select!`;
    /// awaiting a disarmed timer would block for a very long time.
    pub async fn expired(&mut self) {
        self.sleep.as_mut().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn armed_timer_expires_after_timeout() {
        let mut timer = RetransmitTimer::new();
        timer.arm(Duration::from_millis(100));
        assert!(timer.is_armed());
        // With the clock paused, awaiting auto-advances to the deadline.
        timer.expired().await;
        assert!(timer.is_armed(), "expiry does not disarm by itself");
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_pushes_the_deadline_out() {
        let mut timer = RetransmitTimer::new();
        timer.arm(Duration::from_millis(100));
        timer.arm(Duration::from_millis(500));
        let before = Instant::now();
        timer.expired().await;
        assert!(Instant::now() - before >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_does_not_fire() {
        let mut timer = RetransmitTimer::new();
        timer.arm(Duration::from_millis(50));
        timer.disarm();
        assert!(!timer.is_armed());
        tokio::select! {
            _ = timer.expired(), if timer.is_armed() => panic!("disarmed timer fired"),
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
}
