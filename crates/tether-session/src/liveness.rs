//! Liveness timer policy: is a peer still there?
//!
//! A peer proves it is alive by sending probes. The server remembers when
//! the last one arrived and allows a fixed window before giving up. The
//! window must comfortably exceed the probe interval so that jitter and a
//! lost probe or two do not kill a healthy connection.
//!
//! Uses `tokio::time::Instant` so tests can drive the clock with
//! `tokio::time::pause()`.

use std::time::Duration;

use tokio::time::Instant;

/// Smallest step the session timer distinguishes.
const RESOLUTION: Duration = Duration::from_millis(1);

/// `true` iff `now - last_activity <= window`.
///
/// A `now` earlier than `last_activity` counts as alive.
pub fn is_alive(last_activity: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(last_activity) <= window
}

/// A fixed liveness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    window: Duration,
}

impl LivenessPolicy {
    /// Creates a policy with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// See [`is_alive`].
    pub fn is_alive(&self, last_activity: Instant, now: Instant) -> bool {
        is_alive(last_activity, now, self.window)
    }

    /// First instant at which a peer last heard from at `last_activity`
    /// stops being alive, at millisecond resolution.
    pub fn expires_at(&self, last_activity: Instant) -> Instant {
        last_activity + self.window + RESOLUTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_alive_within_window() {
        let t0 = Instant::now();
        assert!(is_alive(t0, t0, WINDOW));
        assert!(is_alive(t0, t0 + Duration::from_secs(59), WINDOW));
    }

    #[test]
    fn test_alive_exactly_at_window() {
        let t0 = Instant::now();
        assert!(is_alive(t0, t0 + WINDOW, WINDOW));
    }

    #[test]
    fn test_dead_after_window() {
        let t0 = Instant::now();
        assert!(!is_alive(t0, t0 + WINDOW + RESOLUTION, WINDOW));
        assert!(!is_alive(t0, t0 + Duration::from_secs(61), WINDOW));
    }

    #[test]
    fn test_clock_before_last_activity_is_alive() {
        let t0 = Instant::now() + Duration::from_secs(5);
        assert!(is_alive(t0, Instant::now(), WINDOW));
    }

    #[test]
    fn test_expires_at_is_first_dead_instant() {
        let policy = LivenessPolicy::new(WINDOW);
        let t0 = Instant::now();
        let expiry = policy.expires_at(t0);
        assert!(!policy.is_alive(t0, expiry));
        assert!(policy.is_alive(t0, expiry - RESOLUTION));
    }

    #[test]
    fn test_window_accessor() {
        assert_eq!(LivenessPolicy::new(WINDOW).window(), WINDOW);
    }
}
