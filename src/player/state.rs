// SPDX-License-Identifier: MPL-2.0
//! Orchestration-layer state passed into the engine each frame.
//!
//! The interaction layer owns these values (widgets, key bindings); the
//! engine reads one [`Controls`] snapshot per [`advance`] call and
//! reconciles its pipelines against it. The engine never mutates the
//! snapshot; when playback finishes it reports [`Outcome::Finished`] and
//! the orchestration layer decides whether to clear its play flag.
//!
//! [`advance`]: super::Player::advance

use crate::config::{
    DEFAULT_VOLUME, MAX_VOLUME, MIN_VOLUME, UNMUTE_RESTORE_VOLUME, VOLUME_STEP,
};

/// Volume level, guaranteed to be within valid range (0.0–1.0).
///
/// This newtype enforces validity at the type level, making it impossible
/// to hand the audio output an out-of-range gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume(f32);

impl Volume {
    /// Creates a new volume level, clamping to valid range.
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self(volume.clamp(MIN_VOLUME, MAX_VOLUME))
    }

    /// Returns the volume value as f32.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Returns true if volume is below the audible threshold.
    #[must_use]
    pub fn is_silent(self) -> bool {
        self.0 < 0.001
    }

    /// Increases volume by one step, clamping to maximum.
    #[must_use]
    pub fn increase(self) -> Self {
        Self::new(self.0 + VOLUME_STEP)
    }

    /// Decreases volume by one step, clamping to minimum.
    #[must_use]
    pub fn decrease(self) -> Self {
        Self::new(self.0 - VOLUME_STEP)
    }

    /// Volume to apply when unmuting: silent levels are restored to a
    /// sensible default so unmute is always audible.
    #[must_use]
    pub fn or_audible(self) -> Self {
        if self.is_silent() {
            Self::new(UNMUTE_RESTORE_VOLUME)
        } else {
            self
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

/// Per-frame control snapshot from the orchestration layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    /// Whether playback should advance. While false the engine holds the
    /// last decoded frame on screen.
    pub play: bool,

    /// Audio muted (volume retained separately).
    pub mute: bool,

    /// Restart from the beginning at end of stream instead of pausing.
    pub loop_enabled: bool,

    /// Playback volume.
    pub volume: Volume,

    /// Pending seek target in seconds, if the user scrubbed. Targets are
    /// clamped by the engine; repeated requests coalesce last-writer-wins.
    pub seek_to: Option<f64>,

    /// Viewport dimensions handed through to the renderer.
    pub viewport: (u32, u32),
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            play: true,
            mute: false,
            loop_enabled: false,
            volume: Volume::default(),
            seek_to: None,
            viewport: (1920, 1080),
        }
    }
}

/// Result of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new frame was decoded and presented at its deadline.
    Presented,

    /// Nothing advanced: paused, or the player is closed. The last frame
    /// remains on screen.
    Held,

    /// End of stream reached with looping disabled. The last frame remains
    /// on screen; a seek re-arms playback.
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_clamps_to_valid_range() {
        assert_eq!(Volume::new(-0.5).value(), MIN_VOLUME);
        assert_eq!(Volume::new(2.0).value(), MAX_VOLUME);
        assert_eq!(Volume::new(0.5).value(), 0.5);
    }

    #[test]
    fn default_volume_is_full_scale() {
        assert_eq!(Volume::default().value(), DEFAULT_VOLUME);
    }

    #[test]
    fn is_silent_detects_zero_volume() {
        assert!(Volume::new(0.0).is_silent());
        assert!(Volume::new(0.0005).is_silent());
        assert!(!Volume::new(0.01).is_silent());
    }

    #[test]
    fn increase_and_decrease_step_and_clamp() {
        let vol = Volume::new(0.5);
        assert!((vol.increase().value() - (0.5 + VOLUME_STEP)).abs() < 0.001);
        assert!((vol.decrease().value() - (0.5 - VOLUME_STEP)).abs() < 0.001);

        assert_eq!(Volume::new(MAX_VOLUME).increase().value(), MAX_VOLUME);
        assert_eq!(Volume::new(MIN_VOLUME).decrease().value(), MIN_VOLUME);
    }

    #[test]
    fn or_audible_restores_silent_volume() {
        assert_eq!(Volume::new(0.0).or_audible().value(), UNMUTE_RESTORE_VOLUME);
        assert_eq!(Volume::new(0.7).or_audible().value(), 0.7);
    }

    #[test]
    fn controls_default_plays_unmuted_without_loop() {
        let controls = Controls::default();
        assert!(controls.play);
        assert!(!controls.mute);
        assert!(!controls.loop_enabled);
        assert!(controls.seek_to.is_none());
    }
}
