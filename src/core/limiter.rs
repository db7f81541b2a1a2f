//! Rate limiting and deduplication of heartbeats.
//!
//! A switch to a different file always dispatches. Continuous activity in the
//! same file dispatches at most `max_per_sec` times per second.

use chrono::{DateTime, Duration, Utc};

/// Rate used when none, or an invalid one, is configured.
pub const DEFAULT_MAX_HEARTBEATS_PER_SEC: f64 = 1.0;

/// Outcome of a dispatch decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// The file differs from the last dispatched one
    FileChanged,
    /// Same file, and the minimum interval has passed
    IntervalElapsed,
    /// Same file, too soon after the last dispatch
    Suppressed,
}

impl DispatchDecision {
    pub fn should_dispatch(self) -> bool {
        !matches!(self, DispatchDecision::Suppressed)
    }
}

/// Replace a non-positive or non-finite rate with the default.
pub fn sanitize_rate(max_per_sec: f64) -> f64 {
    if max_per_sec.is_finite() && max_per_sec > 0.0 {
        max_per_sec
    } else {
        DEFAULT_MAX_HEARTBEATS_PER_SEC
    }
}

/// Decides which heartbeats are sent.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_sec: f64,
    last_file: String,
    last_dispatch: Option<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(max_per_sec: f64) -> Self {
        Self {
            max_per_sec: sanitize_rate(max_per_sec),
            last_file: String::new(),
            last_dispatch: None,
        }
    }

    pub fn max_per_sec(&self) -> f64 {
        self.max_per_sec
    }

    pub fn set_max_per_sec(&mut self, max_per_sec: f64) {
        self.max_per_sec = sanitize_rate(max_per_sec);
    }

    /// Minimum spacing between same-file dispatches.
    pub fn min_interval(&self) -> Duration {
        Duration::microseconds((1_000_000.0 / self.max_per_sec).round() as i64)
    }

    pub fn last_file(&self) -> &str {
        &self.last_file
    }

    pub fn last_dispatch(&self) -> Option<DateTime<Utc>> {
        self.last_dispatch
    }

    /// Decide whether a heartbeat for `file` at `now` goes out, recording it
    /// as the last dispatch if so.
    pub fn decide(&mut self, file: &str, now: DateTime<Utc>) -> DispatchDecision {
        let decision = if file != self.last_file {
            DispatchDecision::FileChanged
        } else {
            match self.last_dispatch {
                None => DispatchDecision::IntervalElapsed,
                // An interval past the representable range never elapses.
                Some(last) => match last.checked_add_signed(self.min_interval()) {
                    Some(next) if now >= next => DispatchDecision::IntervalElapsed,
                    _ => DispatchDecision::Suppressed,
                },
            }
        };

        if decision.should_dispatch() {
            if decision == DispatchDecision::FileChanged {
                self.last_file = file.to_string();
            }
            self.last_dispatch = Some(now);
        }

        decision
    }

    /// Forget the last dispatch so the next event always goes out.
    pub fn reset(&mut self) {
        self.last_file.clear();
        self.last_dispatch = None;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEARTBEATS_PER_SEC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_first_event_always_dispatches() {
        let mut limiter = RateLimiter::default();
        assert_eq!(limiter.decide("/a.rs", t0()), DispatchDecision::FileChanged);
        assert_eq!(limiter.last_file(), "/a.rs");
        assert_eq!(limiter.last_dispatch(), Some(t0()));
    }

    #[test]
    fn test_same_file_within_interval_is_suppressed() {
        let mut limiter = RateLimiter::new(1.0);
        assert!(limiter.decide("/a.rs", t0()).should_dispatch());
        assert_eq!(
            limiter.decide("/a.rs", t0() + ms(500)),
            DispatchDecision::Suppressed
        );
        // Suppression does not move the window.
        assert_eq!(limiter.last_dispatch(), Some(t0()));
        assert_eq!(
            limiter.decide("/a.rs", t0() + ms(1100)),
            DispatchDecision::IntervalElapsed
        );
    }

    #[test]
    fn test_interval_boundary_is_inclusive() {
        let mut limiter = RateLimiter::new(2.0);
        limiter.decide("/a.rs", t0());
        assert_eq!(
            limiter.decide("/a.rs", t0() + ms(500)),
            DispatchDecision::IntervalElapsed
        );
    }

    #[test]
    fn test_file_switch_ignores_interval() {
        let mut limiter = RateLimiter::new(1.0);
        let files = ["/a.rs", "/b.rs", "/a.rs", "/c.rs", "/b.rs"];
        for (i, file) in files.iter().enumerate() {
            let decision = limiter.decide(file, t0() + ms(i as i64));
            assert_eq!(decision, DispatchDecision::FileChanged);
        }
    }

    #[test]
    fn test_same_file_rate_bound() {
        // 20 events/sec for 5 seconds at 2/sec should dispatch at most ceil(2 * 5).
        let mut limiter = RateLimiter::new(2.0);
        let dispatched = (0..100)
            .filter(|i| limiter.decide("/a.rs", t0() + ms(i * 50)).should_dispatch())
            .count();
        assert!(dispatched <= 10, "dispatched {dispatched}");
        assert!(dispatched >= 9);
    }

    #[test]
    fn test_same_file_rate_bound_in_every_window() {
        // Irregular bursts; every 1.5 s window may hold at most ceil(3 * 1.5) dispatches.
        let mut limiter = RateLimiter::new(3.0);
        let offsets: Vec<i64> = (0..400).map(|i| i * 37 + (i % 5) * 7).collect();
        let dispatched: Vec<i64> = offsets
            .iter()
            .copied()
            .filter(|&t| limiter.decide("/a.rs", t0() + ms(t)).should_dispatch())
            .collect();
        assert!(dispatched.len() > 10);

        let window = 1500;
        let last = *offsets.last().unwrap();
        for start in (0..=last).step_by(10) {
            let in_window = dispatched
                .iter()
                .filter(|&&t| t >= start && t < start + window)
                .count();
            assert!(in_window <= 5, "window at {start}ms held {in_window}");
        }
    }

    #[test]
    fn test_tiny_rate_suppresses_without_overflow() {
        let mut limiter = RateLimiter::new(1e-20);
        assert_eq!(limiter.max_per_sec(), 1e-20);
        assert!(limiter.decide("/a.rs", t0()).should_dispatch());
        assert_eq!(
            limiter.decide("/a.rs", t0() + ms(10)),
            DispatchDecision::Suppressed
        );
        assert_eq!(
            limiter.decide("/a.rs", t0() + Duration::days(365 * 100)),
            DispatchDecision::Suppressed
        );
        assert_eq!(
            limiter.decide("/b.rs", t0() + ms(20)),
            DispatchDecision::FileChanged
        );
    }

    #[test]
    fn test_invalid_rates_fall_back_to_default() {
        assert_eq!(RateLimiter::new(0.0).max_per_sec(), 1.0);
        assert_eq!(RateLimiter::new(-3.0).max_per_sec(), 1.0);
        assert_eq!(RateLimiter::new(f64::NAN).max_per_sec(), 1.0);
        assert_eq!(RateLimiter::new(f64::INFINITY).max_per_sec(), 1.0);
        assert_eq!(RateLimiter::new(0.0).min_interval(), ms(1000));
    }

    #[test]
    fn test_fractional_rate_interval() {
        let limiter = RateLimiter::new(0.5);
        assert_eq!(limiter.min_interval(), ms(2000));
    }

    #[test]
    fn test_reset_makes_next_event_dispatch() {
        let mut limiter = RateLimiter::default();
        limiter.decide("/a.rs", t0());
        limiter.reset();
        assert_eq!(
            limiter.decide("/a.rs", t0() + ms(10)),
            DispatchDecision::FileChanged
        );
    }
}
