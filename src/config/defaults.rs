// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for playback tuning constants.
//!
//! This module serves as the single source of truth for the engine's
//! timing and buffering parameters. Constants are organized by category.
//!
//! # Categories
//!
//! - **Audio buffering**: ring capacity, fill cadence, prefill budget
//! - **Synchronization**: drift tolerance and pacing thresholds
//! - **Seeking**: scan precision and clamping margins
//! - **Volume**: playback volume bounds

use std::time::Duration;

// ==========================================================================
// Audio Buffering Defaults
// ==========================================================================

/// Audio ring buffer capacity in f32 samples (4 MiB of PCM).
///
/// The fill loop tops the buffer off to half this capacity, leaving the
/// other half as headroom for a resampled frame that lands near the target.
pub const AUDIO_RING_CAPACITY_SAMPLES: usize = 1 << 20;

/// Interval between wake-ups of the background audio fill task.
pub const AUDIO_FILL_INTERVAL: Duration = Duration::from_millis(20);

/// Number of audio frames decoded ahead of playback start or resume.
///
/// Prefilling avoids an audible gap between the device starting and the
/// first filled buffer arriving.
pub const AUDIO_PREFILL_FRAMES: usize = 20;

// ==========================================================================
// Synchronization Defaults
// ==========================================================================

/// Maximum tolerated offset between video PTS and effective audio time.
pub const AV_DRIFT_TOLERANCE_SECS: f64 = 0.040;

/// Extra stall applied per frame while video is ahead of audio.
pub const AV_DRIFT_STALL: Duration = Duration::from_millis(5);

/// Below this remaining delay, frame pacing switches from sleeping to
/// yield-spinning for precision.
pub const PACING_SPIN_THRESHOLD: Duration = Duration::from_millis(2);

// ==========================================================================
// Seeking Defaults
// ==========================================================================

/// Tolerance when forward-scanning to a seek target.
///
/// Container seeks land at or before a keyframe, never later; the scan
/// stops at the first frame whose PTS is within this epsilon of the target.
pub const SEEK_EPSILON_SECS: f64 = 0.001;

/// Margin kept between a clamped seek target and the stream end
/// (roughly one frame at 30 fps).
pub const SEEK_END_MARGIN_SECS: f64 = 0.033;

/// Upper bound on frames examined during a forward scan.
/// Prevents unbounded scanning on corrupted files or sparse keyframes.
pub const MAX_SEEK_SCAN_FRAMES: u32 = 1000;

// ==========================================================================
// Volume Defaults
// ==========================================================================

/// Default playback volume (0.0 to 1.0).
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Minimum volume level.
pub const MIN_VOLUME: f32 = 0.0;

/// Maximum volume level.
pub const MAX_VOLUME: f32 = 1.0;

/// Volume adjustment step per increment (5%).
pub const VOLUME_STEP: f32 = 0.05;

/// Volume restored when unmuting from an inaudible level.
pub const UNMUTE_RESTORE_VOLUME: f32 = 0.5;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Buffering validation
    assert!(AUDIO_RING_CAPACITY_SAMPLES > 0);
    assert!(AUDIO_RING_CAPACITY_SAMPLES % 2 == 0);
    assert!(AUDIO_PREFILL_FRAMES > 0);

    // Synchronization validation
    assert!(AV_DRIFT_TOLERANCE_SECS > 0.0);
    assert!(SEEK_EPSILON_SECS > 0.0);
    assert!(SEEK_EPSILON_SECS < SEEK_END_MARGIN_SECS);
    assert!(MAX_SEEK_SCAN_FRAMES > 0);

    // Volume validation
    assert!(MIN_VOLUME >= 0.0);
    assert!(MAX_VOLUME > MIN_VOLUME);
    assert!(DEFAULT_VOLUME >= MIN_VOLUME);
    assert!(DEFAULT_VOLUME <= MAX_VOLUME);
    assert!(UNMUTE_RESTORE_VOLUME > MIN_VOLUME);
    assert!(UNMUTE_RESTORE_VOLUME <= MAX_VOLUME);
};
