// SPDX-License-Identifier: MPL-2.0
//! Wall-clock-to-media-time mapping and frame pacing.
//!
//! The playback clock anchors a wall-clock epoch such that
//! `now == epoch + media_pts` holds during steady playback. Each decoded
//! frame is held until its deadline, and when audio is present the video
//! additionally yields to the audio clock: audio hardware cadence is less
//! forgiving than video display, so drift is corrected by stalling video,
//! never by touching audio samples.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{AV_DRIFT_STALL, AV_DRIFT_TOLERANCE_SECS, PACING_SPIN_THRESHOLD};

/// Time source abstraction for the pacing loop.
///
/// Production code uses [`SystemClock`]; tests inject a fake that advances
/// instantly on `sleep`, making deadline arithmetic deterministic.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
    fn yield_now(&self);
}

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Blocks until `deadline`, sleeping coarsely while more than
/// [`PACING_SPIN_THRESHOLD`] remains and yield-spinning for the rest.
///
/// Sleeping covers the bulk of the wait cheaply; the final yield-spin
/// phase bounds the wake-up error to scheduler granularity.
pub fn wait_until<C: Clock>(clock: &C, deadline: Instant) {
    loop {
        let now = clock.now();
        if now >= deadline {
            break;
        }

        let remaining = deadline - now;
        if remaining > PACING_SPIN_THRESHOLD {
            clock.sleep(remaining);
        } else {
            clock.yield_now();
        }
    }
}

/// Decides whether video should stall to let audio catch up.
///
/// Returns a stall duration when the video frame is ahead of the effective
/// audio position by more than the drift tolerance. Video running behind
/// audio is left alone: the pacing deadline already releases such frames
/// immediately, and audio is never dropped or resampled to compensate.
#[must_use]
pub fn drift_stall(video_pts_secs: f64, effective_audio_secs: f64) -> Option<Duration> {
    let drift = video_pts_secs - effective_audio_secs;
    if drift > AV_DRIFT_TOLERANCE_SECS {
        Some(AV_DRIFT_STALL)
    } else {
        None
    }
}

/// Lock-free handle onto the current playback position.
///
/// Cloned out to the UI layer for slider display; reads are tolerant of
/// being slightly stale.
#[derive(Debug, Clone)]
pub struct PositionHandle(Arc<AtomicU64>);

impl PositionHandle {
    /// Returns the current media position in seconds.
    #[must_use]
    pub fn secs(&self) -> f64 {
        self.0.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

/// Maps media PTS values onto wall-clock deadlines.
pub struct PlaybackClock<C: Clock = SystemClock> {
    clock: C,

    /// Wall-clock instant corresponding to media time zero.
    epoch: Instant,

    /// Current media position in microseconds, mirrored for lock-free
    /// reads by the UI.
    position_us: Arc<AtomicU64>,
}

impl PlaybackClock<SystemClock> {
    /// Creates a clock anchored at media time zero, now.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for PlaybackClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> PlaybackClock<C> {
    /// Creates a clock over an injected time source.
    pub fn with_clock(clock: C) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            position_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Re-anchors the epoch so that `media_time_secs` corresponds to now.
    ///
    /// Called on seek completion, loop restart, and pause-to-play
    /// transitions; after a reset the delay computation is immediately
    /// valid across the discontinuity.
    pub fn reset(&mut self, media_time_secs: f64) {
        let offset = Duration::from_secs_f64(media_time_secs.max(0.0));
        let now = self.clock.now();
        self.epoch = now.checked_sub(offset).unwrap_or(now);
        self.store_position(media_time_secs);
    }

    /// Blocks until the wall-clock deadline for `pts_secs`, then records
    /// it as the current position. Never returns before the deadline;
    /// frames are presented on time or late, never early.
    pub fn wait_for_frame(&self, pts_secs: f64) {
        wait_until(&self.clock, self.deadline_for(pts_secs));
        self.store_position(pts_secs);
    }

    /// Applies a drift-correction stall, if the synchronizer asked for one.
    pub fn stall(&self, duration: Duration) {
        self.clock.sleep(duration);
    }

    /// Returns the wall-clock deadline for a frame with the given PTS.
    #[must_use]
    pub fn deadline_for(&self, pts_secs: f64) -> Instant {
        self.epoch + Duration::from_secs_f64(pts_secs.max(0.0))
    }

    /// Returns the current media position in seconds.
    #[must_use]
    pub fn position_secs(&self) -> f64 {
        self.position_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Returns a lock-free position handle for the UI layer.
    #[must_use]
    pub fn position_handle(&self) -> PositionHandle {
        PositionHandle(Arc::clone(&self.position_us))
    }

    fn store_position(&self, secs: f64) {
        let micros = (secs.max(0.0) * 1_000_000.0) as u64;
        self.position_us.store(micros, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fake time source: `sleep` advances a virtual instant instantly and
    /// records each request, `yield_now` nudges time forward slightly so
    /// spin phases terminate.
    struct FakeClock {
        now: Mutex<Instant>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
            self.sleeps.lock().unwrap().push(duration);
        }

        fn yield_now(&self) {
            *self.now.lock().unwrap() += Duration::from_micros(100);
        }
    }

    #[test]
    fn wait_until_sleeps_coarse_then_spins() {
        let fake = FakeClock::new();
        let start = (&fake).now();
        let deadline = start + Duration::from_millis(50);

        wait_until(&&fake, deadline);

        assert!((&fake).now() >= deadline);
        // One coarse sleep covers everything beyond the spin threshold.
        let sleeps = fake.sleeps();
        assert_eq!(sleeps.len(), 1);
        assert_eq!(sleeps[0], Duration::from_millis(50));
    }

    #[test]
    fn wait_until_spins_for_sub_threshold_delays() {
        let fake = FakeClock::new();
        let deadline = (&fake).now() + Duration::from_millis(1);

        wait_until(&&fake, deadline);

        // Below the spin threshold no sleep is issued at all.
        assert!(fake.sleeps().is_empty());
        assert!((&fake).now() >= deadline);
    }

    #[test]
    fn wait_until_past_deadline_returns_immediately() {
        let fake = FakeClock::new();
        let deadline = (&fake).now();
        wait_until(&&fake, deadline);
        assert!(fake.sleeps().is_empty());
    }

    #[test]
    fn reset_anchors_epoch_to_media_time() {
        let fake = FakeClock::new();
        let mut clock = PlaybackClock::with_clock(&fake);
        clock.reset(5.0);

        // A frame at 5.0s is due immediately; a frame at 5.1s is due in
        // 100ms of virtual time.
        assert!(clock.deadline_for(5.0) <= (&fake).now());
        assert_eq!(
            clock.deadline_for(5.1) - (&fake).now(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn wait_for_frame_updates_position() {
        let fake = FakeClock::new();
        let mut clock = PlaybackClock::with_clock(&fake);
        clock.reset(0.0);
        clock.wait_for_frame(0.25);

        assert!((clock.position_secs() - 0.25).abs() < 1e-6);
        assert!((&fake).now() >= clock.deadline_for(0.25));
    }

    #[test]
    fn position_handle_tracks_clock() {
        let fake = FakeClock::new();
        let mut clock = PlaybackClock::with_clock(&fake);
        let handle = clock.position_handle();

        clock.reset(12.5);
        assert!((handle.secs() - 12.5).abs() < 1e-6);
    }

    #[test]
    fn drift_stall_engages_only_when_video_leads() {
        // Within tolerance: no correction either way.
        assert_eq!(drift_stall(10.02, 10.0), None);
        assert_eq!(drift_stall(9.98, 10.0), None);

        // Video ahead beyond tolerance: stall.
        assert_eq!(drift_stall(10.05, 10.0), Some(AV_DRIFT_STALL));

        // Video behind: pacing already releases the frame immediately.
        assert_eq!(drift_stall(9.90, 10.0), None);
    }

    #[test]
    fn reset_clamps_negative_media_time() {
        let fake = FakeClock::new();
        let mut clock = PlaybackClock::with_clock(&fake);
        clock.reset(-1.0);
        assert_eq!(clock.position_secs(), 0.0);
    }
}
