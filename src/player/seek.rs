// SPDX-License-Identifier: MPL-2.0
//! Cross-stream seek coordination.
//!
//! A seek touches every moving part of the engine: both decode pipelines,
//! the ring buffer, the clock epoch, and the displayed frame. The
//! coordinator latches incoming targets and runs the whole sequence to
//! completion before the render loop resumes pulling frames, so the
//! operation is atomic from the caller's point of view.

use crate::error::Result;
use crate::player::audio::AudioHandle;
use crate::player::clock::PlaybackClock;
use crate::player::video::{clamp_seek_target, FrameBuffer, VideoPipeline};
use crate::render::Renderer;

/// Latch for pending seek targets.
///
/// Requests arriving while a seek is in flight (or before the engine gets
/// around to it) overwrite the previous target: last writer wins. They
/// are never queued: replaying a scrub gesture position by position would
/// serve no one.
#[derive(Debug, Default)]
pub struct SeekCoordinator {
    pending: Option<f64>,
}

impl SeekCoordinator {
    /// Latches a seek target in seconds, replacing any pending one.
    pub fn request(&mut self, target_secs: f64) {
        self.pending = Some(target_secs);
    }

    /// Takes the latched target, if any.
    pub fn take(&mut self) -> Option<f64> {
        self.pending.take()
    }

    /// Whether a target is waiting to be executed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Executes one coordinated seek across both pipelines.
///
/// Sequence: pause audio, clamp the target, seek video (blocking,
/// forward-scanning to the target), present the landed frame, seek audio
/// (resetting its buffer), optionally prefill and resume, and re-anchor
/// the clock epoch so delay computations are valid immediately after the
/// discontinuity. The two pipeline seeks share no state and run
/// sequentially without a lock.
pub fn run_cross_stream_seek(
    target_secs: f64,
    video: &mut VideoPipeline,
    frame: &mut FrameBuffer,
    audio: Option<&AudioHandle>,
    clock: &mut PlaybackClock,
    renderer: &mut dyn Renderer,
    resume: bool,
) -> Result<()> {
    if let Some(audio) = audio {
        audio.pause();
    }

    let target = clamp_seek_target(target_secs, video.duration_secs());

    let landed = video.seek(target, frame)?;
    if landed {
        renderer.update_texture(frame.pixels(), frame.width(), frame.height());
    }

    if let Some(audio) = audio {
        audio.seek(target);
        if resume {
            if !audio.prefill() {
                log::debug!("audio stream ended during post-seek prefill");
            }
            audio.play();
        }
    }

    // The landed frame's actual time, not the requested target, anchors
    // the epoch: keyframe imprecision already moved us to the real frame.
    let landed_secs = if landed { frame.pts_secs() } else { target };
    clock.reset(landed_secs);

    Ok(())
}
