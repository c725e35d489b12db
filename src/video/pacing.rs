//! Timestamp-driven frame pacing
//!
//! Each picture is due at `origin + pts_seconds`, where the origin is the
//! monotonic instant playback started. The origin is never moved:
//! a pipeline that falls behind presents late frames immediately instead of
//! re-basing the clock.

use std::time::{Duration, Instant};

/// Monotonic time source and sleeper
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Time left until `target_secs`, truncated to whole microseconds
///
/// Zero when the target has already passed or is not a finite number.
pub fn wait_duration(target_secs: f64, elapsed: Duration) -> Duration {
    let remaining = target_secs - elapsed.as_secs_f64();
    if !remaining.is_finite() || remaining <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((remaining * 1_000_000.0) as u64)
}

/// What pacing one frame did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaceOutcome {
    /// Time spent sleeping
    pub waited: Duration,
    /// How far past its due time the frame was, zero when on time
    pub lateness: Duration,
}

/// Suspends the caller until each frame's presentation time
#[derive(Debug)]
pub struct FramePacer<C: Clock = SystemClock> {
    clock: C,
    origin: Option<Instant>,
}

impl Default for FramePacer<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> FramePacer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, origin: None }
    }

    /// Start the playback clock if it is not running yet
    pub fn start(&mut self) -> Instant {
        *self.origin.get_or_insert_with(|| self.clock.now())
    }

    /// Time since the playback clock started (zero before it starts)
    pub fn elapsed(&self) -> Duration {
        self.origin
            .map(|origin| self.clock.now().saturating_duration_since(origin))
            .unwrap_or_default()
    }

    /// How far behind schedule a frame due at `target_secs` is right now
    ///
    /// Saturates at `Duration::MAX` for targets too far in the past to represent.
    pub fn lateness(&self, target_secs: f64) -> Duration {
        let behind = self.elapsed().as_secs_f64() - target_secs;
        if behind.is_finite() && behind > 0.0 {
            Duration::try_from_secs_f64(behind).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Block until the frame due at `target_secs` should be shown
    pub fn pace(&mut self, target_secs: f64) -> PaceOutcome {
        self.start();
        let elapsed = self.elapsed();
        let waited = wait_duration(target_secs, elapsed);

        if waited > Duration::ZERO {
            tracing::trace!("Pacing: target {:.4}s, elapsed {:.4}s, sleeping {:?}", target_secs, elapsed.as_secs_f64(), waited);
            self.clock.sleep(waited);
            return PaceOutcome {
                waited,
                lateness: Duration::ZERO,
            };
        }

        PaceOutcome {
            waited: Duration::ZERO,
            lateness: self.lateness(target_secs),
        }
    }

    pub fn origin(&self) -> Option<Instant> {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::test_support::ManualClock;

    #[test]
    fn test_wait_when_ahead() {
        let wait = wait_duration(5.0, Duration::from_secs(4));
        assert_eq!(wait, Duration::from_secs(1));

        let wait = wait_duration(1.0 / 30.0, Duration::from_millis(10));
        let expected = 1.0 / 30.0 - 0.010;
        assert!((wait.as_secs_f64() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_no_wait_when_behind() {
        assert_eq!(wait_duration(1.0, Duration::from_secs(2)), Duration::ZERO);
        assert_eq!(wait_duration(2.0, Duration::from_secs(2)), Duration::ZERO);
        assert_eq!(wait_duration(-3.0, Duration::ZERO), Duration::ZERO);
        assert_eq!(wait_duration(f64::NAN, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_waits_until_timestamp() {
        let clock = ManualClock::new();
        let mut pacer = FramePacer::new(clock.clone());
        pacer.start();

        clock.advance(Duration::from_secs(4));
        let outcome = pacer.pace(5.0);

        assert_eq!(outcome.waited, Duration::from_secs(1));
        assert_eq!(outcome.lateness, Duration::ZERO);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
        assert_eq!(pacer.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_late_frame_is_not_delayed() {
        let clock = ManualClock::new();
        let mut pacer = FramePacer::new(clock.clone());
        pacer.start();

        clock.advance(Duration::from_millis(1500));
        let outcome = pacer.pace(1.0);

        assert_eq!(outcome.waited, Duration::ZERO);
        assert!((outcome.lateness.as_secs_f64() - 0.5).abs() < 1e-9);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_origin_is_captured_once() {
        let clock = ManualClock::new();
        let mut pacer = FramePacer::new(clock.clone());
        assert_eq!(pacer.elapsed(), Duration::ZERO);

        let origin = pacer.start();
        clock.advance(Duration::from_millis(100));
        assert_eq!(pacer.start(), origin);
        pacer.pace(0.0);
        assert_eq!(pacer.origin(), Some(origin));
    }

    #[test]
    fn test_extreme_negative_target_saturates() {
        let clock = ManualClock::new();
        let mut pacer = FramePacer::new(clock.clone());

        // Garbage pts from a huge timebase numerator
        let target = (-(1i64 << 62)) as f64 * 10.0;
        let outcome = pacer.pace(target);

        assert_eq!(outcome.waited, Duration::ZERO);
        assert_eq!(outcome.lateness, Duration::MAX);
        assert!(clock.sleeps().is_empty());
        assert_eq!(pacer.lateness(f64::NEG_INFINITY), Duration::ZERO);
    }
}
