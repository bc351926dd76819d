// SPDX-License-Identifier: MPL-2.0
//! # cineview
//!
//! Synchronized audio/video playback engine built on FFmpeg and cpal.
//!
//! The engine decodes independent audio and video elementary streams and
//! presents them in mutual temporal alignment, with interactive seeking
//! and gapless looped playback. Rendering, widgets, and window integration
//! are external: a front-end implements [`Renderer`], feeds a [`Controls`]
//! snapshot into [`Player::advance`] once per frame, and draws whatever
//! the engine presents.
//!
//! ```no_run
//! use cineview::{Controls, NullRenderer, Outcome, Player};
//!
//! # fn main() -> cineview::Result<()> {
//! let mut player = Player::open("clip.mp4")?;
//! let mut renderer = NullRenderer::default();
//! let controls = Controls::default();
//!
//! while player.advance(&controls, &mut renderer)? != Outcome::Finished {}
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod player;
pub mod render;

pub use error::{Error, MediaError, Result};
pub use player::{
    AudioRingBuffer, Controls, Outcome, PlaybackClock, Player, PositionHandle, SeekCoordinator,
    Volume,
};
pub use render::{NullRenderer, Renderer};
