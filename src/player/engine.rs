// SPDX-License-Identifier: MPL-2.0
//! Playback engine orchestration.
//!
//! [`Player`] owns both decode pipelines, the playback clock, and the seek
//! coordinator, and exposes a single per-frame entry point:
//! [`advance`](Player::advance). The caller's render loop invokes it once
//! per frame with the current [`Controls`] snapshot; the engine reconciles
//! transport state, executes pending seeks, decodes and paces the next
//! frame, and hands it to the renderer at its deadline.

use std::path::Path;

use crate::error::Result;
use crate::player::audio::AudioHandle;
use crate::player::clock::{drift_stall, PlaybackClock, PositionHandle};
use crate::player::seek::{run_cross_stream_seek, SeekCoordinator};
use crate::player::state::{Controls, Outcome, Volume};
use crate::player::video::{FrameBuffer, VideoPipeline};
use crate::render::Renderer;

/// Synchronized audio/video playback engine.
pub struct Player {
    video: Option<VideoPipeline>,
    audio: Option<AudioHandle>,
    frame: FrameBuffer,
    clock: PlaybackClock,
    seek: SeekCoordinator,

    width: u32,
    height: u32,
    duration_secs: f64,

    /// Last applied control state, for edge detection.
    playing: bool,
    muted: bool,
    volume: Volume,

    /// End of stream reached with looping disabled.
    finished: bool,

    /// The frame buffer holds pixels the renderer has not seen yet.
    texture_dirty: bool,
}

impl Player {
    /// Opens `path` for playback.
    ///
    /// The video stream is mandatory; failure to open it is fatal. Audio
    /// is best-effort: a missing track or an unavailable output device
    /// degrades to silent playback with a warning, never an error.
    ///
    /// The first frame is decoded and held, and the audio ring is
    /// prefilled, so the first `advance` can present immediately and
    /// playback starts without an audible gap.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be opened, contains no
    /// video stream, or its codec is unsupported.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut video = VideoPipeline::open(path)?;
        let width = video.width();
        let height = video.height();
        let duration_secs = video.duration_secs();
        let mut frame = FrameBuffer::new(width, height);

        let audio = match AudioHandle::open(path, Volume::default()) {
            Ok(Some(audio)) => Some(audio),
            Ok(None) => {
                log::warn!("no audio track found, playing silently");
                None
            }
            Err(e) => {
                log::warn!("audio unavailable ({e}), playing silently");
                None
            }
        };

        let texture_dirty = video.read_frame(&mut frame)?;

        let mut clock = PlaybackClock::new();
        clock.reset(frame.pts_secs());

        if let Some(audio) = &audio {
            if !audio.prefill() {
                log::warn!("audio stream ended during prefill");
            }
        }

        Ok(Self {
            video: Some(video),
            audio,
            frame,
            clock,
            seek: SeekCoordinator::default(),
            width,
            height,
            duration_secs,
            playing: false,
            muted: false,
            volume: Volume::default(),
            finished: false,
            texture_dirty,
        })
    }

    /// Advances playback by at most one frame.
    ///
    /// Reads one `controls` snapshot, reconciles transport state against
    /// it, executes any latched seek to completion, then, when playing,
    /// decodes the next frame, applies drift correction against the audio
    /// clock, waits out the frame's wall-clock deadline, and presents it.
    ///
    /// Blocks for up to one frame interval; this is the pacing mechanism,
    /// not a defect. Returns [`Outcome::Held`] after `close`.
    ///
    /// # Errors
    ///
    /// Returns an error only for unrecoverable pipeline failures; decode
    /// errors on individual packets are recovered internally.
    pub fn advance(&mut self, controls: &Controls, renderer: &mut dyn Renderer) -> Result<Outcome> {
        let Some(video) = self.video.as_mut() else {
            return Ok(Outcome::Held);
        };

        // Volume and mute are cheap atomics; apply on change only to keep
        // the common path branch-free.
        if controls.volume != self.volume {
            if let Some(audio) = &self.audio {
                audio.set_volume(controls.volume);
            }
            self.volume = controls.volume;
        }
        if controls.mute != self.muted {
            if let Some(audio) = &self.audio {
                audio.set_muted(controls.mute);
            }
            self.muted = controls.mute;
        }

        if let Some(target) = controls.seek_to {
            self.seek.request(target);
        }
        while let Some(target) = self.seek.take() {
            run_cross_stream_seek(
                target,
                video,
                &mut self.frame,
                self.audio.as_ref(),
                &mut self.clock,
                renderer,
                controls.play,
            )?;
            self.finished = false;
            self.texture_dirty = false;
        }

        if controls.play != self.playing {
            if controls.play {
                // Resume: re-anchor the epoch at the held position so the
                // next deadline computation spans the pause correctly.
                self.clock.reset(self.clock.position_secs());
                if let Some(audio) = &self.audio {
                    if !self.finished {
                        audio.play();
                    }
                }
            } else if let Some(audio) = &self.audio {
                audio.pause();
            }
            self.playing = controls.play;
        }

        if !controls.play || self.finished {
            self.present_held(controls, renderer);
            return Ok(if self.finished {
                Outcome::Finished
            } else {
                Outcome::Held
            });
        }

        // A frame decoded but never shown (the initial frame, typically)
        // is presented before any further decoding overwrites it.
        if self.texture_dirty {
            self.clock.wait_for_frame(self.frame.pts_secs());
            renderer.update_texture(self.frame.pixels(), self.width, self.height);
            renderer.render(
                controls.viewport.0,
                controls.viewport.1,
                self.width,
                self.height,
            );
            self.texture_dirty = false;
            return Ok(Outcome::Presented);
        }

        if video.read_frame(&mut self.frame)? {
            // Video yields to the audio clock: when the frame runs more
            // than the tolerance ahead of what is audible, stall briefly
            // so audio catches up.
            if let Some(audio) = &self.audio {
                if audio.is_playing() {
                    let effective = audio.current_time_secs() - audio.latency_secs();
                    if let Some(stall) = drift_stall(self.frame.pts_secs(), effective) {
                        self.clock.stall(stall);
                    }
                }
            }

            self.clock.wait_for_frame(self.frame.pts_secs());
            renderer.update_texture(self.frame.pixels(), self.width, self.height);
            renderer.render(
                controls.viewport.0,
                controls.viewport.1,
                self.width,
                self.height,
            );
            self.texture_dirty = false;
            return Ok(Outcome::Presented);
        }

        // End of stream.
        if controls.loop_enabled {
            run_cross_stream_seek(
                0.0,
                video,
                &mut self.frame,
                self.audio.as_ref(),
                &mut self.clock,
                renderer,
                true,
            )?;
            self.texture_dirty = false;
            renderer.render(
                controls.viewport.0,
                controls.viewport.1,
                self.width,
                self.height,
            );
            return Ok(Outcome::Presented);
        }

        self.finished = true;
        if let Some(audio) = &self.audio {
            audio.pause();
        }
        self.present_held(controls, renderer);
        Ok(Outcome::Finished)
    }

    /// Draws the held frame without advancing playback.
    fn present_held(&mut self, controls: &Controls, renderer: &mut dyn Renderer) {
        if self.texture_dirty {
            renderer.update_texture(self.frame.pixels(), self.width, self.height);
            self.texture_dirty = false;
        }
        renderer.render(
            controls.viewport.0,
            controls.viewport.1,
            self.width,
            self.height,
        );
    }

    /// Releases the audio worker, the output device, and both decode
    /// contexts. Idempotent; also runs on drop.
    ///
    /// The worker is joined before any decode context is torn down, so no
    /// fill or callback ever runs against freed state.
    pub fn close(&mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.stop();
            audio.shutdown();
        }
        self.video = None;
    }

    /// Total stream duration in seconds (0 when unknown).
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Current playback position in seconds.
    #[must_use]
    pub fn position_secs(&self) -> f64 {
        self.clock.position_secs()
    }

    /// Lock-free position handle for a UI thread's slider display.
    #[must_use]
    pub fn position_handle(&self) -> PositionHandle {
        self.clock.position_handle()
    }

    /// Video frame dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether an audio track is being played.
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Whether playback reached end of stream with looping disabled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_fails_for_nonexistent_file() {
        assert!(Player::open("/nonexistent/clip.mp4").is_err());
    }

    #[test]
    fn open_fails_for_non_media_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("not_media.mp4");
        std::fs::write(&path, b"plain text pretending to be video").unwrap();

        assert!(Player::open(&path).is_err());
    }
}
