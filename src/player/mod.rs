// SPDX-License-Identifier: MPL-2.0
//! Synchronized decode-and-playback engine.
//!
//! Three execution contexts cooperate here: the caller's render loop
//! drives video decode and frame pacing through [`Player::advance`]; a
//! background worker thread tops off the audio ring buffer; and the OS
//! audio callback drains it at hardware cadence. The playback clock sits
//! between video pacing and audio draining, correcting drift by stalling
//! video; audio is the reference clock whenever it is present.

pub mod audio;
pub mod clock;
mod engine;
pub mod output;
pub mod ring_buffer;
mod seek;
mod state;
pub mod video;

pub use audio::{AudioHandle, AudioStreamInfo};
pub use clock::{drift_stall, wait_until, Clock, PlaybackClock, PositionHandle, SystemClock};
pub use engine::Player;
pub use output::{AudioOutput, OutputSpec};
pub use ring_buffer::AudioRingBuffer;
pub use seek::SeekCoordinator;
pub use state::{Controls, Outcome, Volume};
pub use video::{clamp_seek_target, FrameBuffer, VideoPipeline};
