// SPDX-License-Identifier: MPL-2.0
//! Video decode pipeline using FFmpeg.
//!
//! Opens a container, demultiplexes the selected video stream, decodes
//! packets into frames, and converts them to a fixed RGBA layout in a
//! caller-owned buffer. Seeking is the two-phase protocol containers
//! require: a backward keyframe seek followed by a forward scan to the
//! requested time.

use std::path::Path;
use std::sync::Once;

use crate::config::{MAX_SEEK_SCAN_FRAMES, SEEK_END_MARGIN_SECS, SEEK_EPSILON_SECS};
use crate::error::{MediaError, Result};

/// Static flag to ensure FFmpeg is initialized only once.
static FFMPEG_INIT: Once = Once::new();

/// Initialize FFmpeg with appropriate log level.
///
/// Safe to call multiple times; initialization only happens once thanks
/// to `std::sync::Once`. The FFmpeg log level is set to ERROR to suppress
/// per-packet warnings from imperfect files.
pub fn init_ffmpeg() -> Result<()> {
    let mut init_result: Result<()> = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(MediaError::OpenFailed(format!("FFmpeg init failed: {e}")).into());
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Clamps a seek target to the addressable range of a stream.
///
/// Out-of-range targets are clamped rather than rejected; the upper bound
/// keeps roughly one frame of headroom so a seek to the very end still
/// lands on a decodable frame.
#[must_use]
pub fn clamp_seek_target(target_secs: f64, duration_secs: f64) -> f64 {
    let upper = (duration_secs - SEEK_END_MARGIN_SECS).max(0.0);
    target_secs.clamp(0.0, upper)
}

/// Caller-owned pixel buffer holding the most recently decoded frame.
///
/// The storage is exactly `width * height * 4` bytes of RGBA and is
/// overwritten in place by every decode; do not retain references to the
/// pixel data across calls.
pub struct FrameBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    pts: i64,
    pts_secs: f64,
}

impl FrameBuffer {
    /// Allocates a buffer for frames of the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; (width * height * 4) as usize],
            width,
            height,
            pts: 0,
            pts_secs: 0.0,
        }
    }

    /// RGBA pixel data of the last decoded frame.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Presentation timestamp in stream time-base units.
    #[must_use]
    pub fn pts(&self) -> i64 {
        self.pts
    }

    /// Presentation timestamp in seconds.
    #[must_use]
    pub fn pts_secs(&self) -> f64 {
        self.pts_secs
    }
}

/// Decode pipeline for the video elementary stream.
///
/// Owns its container and codec contexts exclusively; all methods run on
/// the caller's thread (the render loop) and may block on disk or codec
/// work.
pub struct VideoPipeline {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base_f64: f64,
    width: u32,
    height: u32,
    duration_secs: f64,
    eof_sent: bool,
}

impl VideoPipeline {
    /// Opens the container and prepares the first usable video stream for
    /// decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be opened, no video stream
    /// exists, no decoder is available for it, or its dimensions are
    /// invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        init_ffmpeg()?;

        let ictx = ffmpeg_next::format::input(&path)
            .map_err(|e| MediaError::OpenFailed(format!("{e}")))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(MediaError::NoVideoStream)?;
        let stream_index = stream.index();

        let time_base = stream.time_base();
        let time_base_f64 =
            f64::from(time_base.numerator()) / f64::from(time_base.denominator());

        // Stream duration, falling back to the container-level duration
        // (in AV_TIME_BASE units) when the stream does not declare one.
        let duration_secs = if stream.duration() > 0 {
            stream.duration() as f64 * time_base_f64
        } else if ictx.duration() > 0 {
            ictx.duration() as f64 / 1_000_000.0
        } else {
            0.0
        };

        let context_decoder =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| MediaError::UnsupportedCodec(format!("{e}")))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| MediaError::UnsupportedCodec(format!("{e}")))?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(MediaError::DecodeFailed(format!(
                "invalid video dimensions: {width}x{height}"
            ))
            .into());
        }

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGBA,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| MediaError::DecodeFailed(format!("scaler: {e}")))?;

        log::info!(
            "video stream: {}x{}, {:.2}s, time base {}/{}",
            width,
            height,
            duration_secs,
            time_base.numerator(),
            time_base.denominator()
        );

        Ok(Self {
            input: ictx,
            decoder,
            scaler,
            stream_index,
            time_base_f64,
            width,
            height,
            duration_secs,
            eof_sent: false,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total stream duration in seconds (0 when unknown).
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Decodes the next frame of the stream into `frame`.
    ///
    /// Pulls packets until one decodes completely; corrupt packets are
    /// skipped and retried, never surfaced. `Ok(true)` means `frame` holds
    /// new pixels and a PTS; `Ok(false)` means the stream ended (the
    /// decoder is drained first, so reordered frames are not lost).
    ///
    /// # Errors
    ///
    /// Returns an error only when frame conversion fails unrecoverably.
    pub fn read_frame(&mut self, frame: &mut FrameBuffer) -> Result<bool> {
        loop {
            let packet = self.next_stream_packet();
            let container_exhausted = packet.is_none();

            match packet {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // Corrupt packet: skip it and retry with the next.
                        log::debug!("skipping undecodable video packet: {e}");
                        continue;
                    }
                }
                None => {
                    // Container exhausted: drain the decoder's delay queue.
                    if !self.eof_sent {
                        let _ = self.decoder.send_eof();
                        self.eof_sent = true;
                    }
                }
            }

            let mut decoded = ffmpeg_next::frame::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                self.convert_into(&decoded, frame)?;
                return Ok(true);
            }

            if container_exhausted {
                return Ok(false);
            }
        }
    }

    /// Seeks to `target_secs` and scans forward to it.
    ///
    /// The container seek lands at or before the nearest keyframe, never
    /// later, so after flushing the decoder this scans by `read_frame`
    /// until the decoded frame's presentation time reaches the (clamped)
    /// target. `Ok(true)` leaves the landed frame in `frame`; `Ok(false)`
    /// means the stream ended before the target was reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the container rejects the seek.
    pub fn seek(&mut self, target_secs: f64, frame: &mut FrameBuffer) -> Result<bool> {
        let target = clamp_seek_target(target_secs, self.duration_secs);

        let timestamp = (target * 1_000_000.0) as i64;
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| MediaError::SeekFailed(format!("{e}")))?;
        self.decoder.flush();
        self.eof_sent = false;

        let mut scanned = 0u32;
        loop {
            if !self.read_frame(frame)? {
                return Ok(false);
            }
            if frame.pts_secs() >= target - SEEK_EPSILON_SECS {
                return Ok(true);
            }
            scanned += 1;
            if scanned >= MAX_SEEK_SCAN_FRAMES {
                log::debug!(
                    "seek scan gave up {:.3}s short of target {:.3}s",
                    target - frame.pts_secs(),
                    target
                );
                return Ok(true);
            }
        }
    }

    /// Reads the next packet belonging to the selected stream, or `None`
    /// at end of container.
    fn next_stream_packet(&mut self) -> Option<ffmpeg_next::Packet> {
        loop {
            match self.input.packets().next() {
                Some((stream, packet)) if stream.index() == self.stream_index => {
                    return Some(packet)
                }
                Some(_) => continue,
                None => return None,
            }
        }
    }

    /// Converts a decoded frame to RGBA into the caller's buffer, handling
    /// stride, and records its PTS (best-effort timestamp as fallback).
    fn convert_into(
        &mut self,
        decoded: &ffmpeg_next::frame::Video,
        frame: &mut FrameBuffer,
    ) -> Result<()> {
        let mut rgba = ffmpeg_next::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgba)
            .map_err(|e| MediaError::DecodeFailed(format!("scaling: {e}")))?;

        let data = rgba.data(0);
        let stride = rgba.stride(0);
        let row_bytes = (self.width * 4) as usize;

        frame.pixels.clear();
        for y in 0..self.height as usize {
            let row_start = y * stride;
            frame
                .pixels
                .extend_from_slice(&data[row_start..row_start + row_bytes]);
        }

        let pts = decoded.pts().or_else(|| decoded.timestamp()).unwrap_or(0);
        frame.pts = pts;
        frame.pts_secs = pts as f64 * self.time_base_f64;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_seek_target_passes_valid_targets_through() {
        assert_eq!(clamp_seek_target(5.0, 10.0), 5.0);
        assert_eq!(clamp_seek_target(0.0, 10.0), 0.0);
    }

    #[test]
    fn clamp_seek_target_clamps_negative_to_zero() {
        assert_eq!(clamp_seek_target(-3.0, 10.0), 0.0);
    }

    #[test]
    fn clamp_seek_target_keeps_one_frame_margin_at_end() {
        let clamped = clamp_seek_target(10.0, 10.0);
        assert!((clamped - (10.0 - SEEK_END_MARGIN_SECS)).abs() < 1e-9);

        let clamped = clamp_seek_target(99.0, 10.0);
        assert!((clamped - (10.0 - SEEK_END_MARGIN_SECS)).abs() < 1e-9);
    }

    #[test]
    fn clamp_seek_target_handles_tiny_durations() {
        // Streams shorter than the margin clamp to zero rather than a
        // negative time.
        assert_eq!(clamp_seek_target(0.5, 0.01), 0.0);
        assert_eq!(clamp_seek_target(0.0, 0.0), 0.0);
    }

    #[test]
    fn frame_buffer_allocates_rgba_layout() {
        let frame = FrameBuffer::new(320, 240);
        assert_eq!(frame.pixels().len(), 320 * 240 * 4);
        assert_eq!(frame.width(), 320);
        assert_eq!(frame.height(), 240);
        assert_eq!(frame.pts(), 0);
        assert_eq!(frame.pts_secs(), 0.0);
    }

    #[test]
    fn open_fails_for_nonexistent_file() {
        let result = VideoPipeline::open("/nonexistent/video.mp4");
        assert!(result.is_err());
    }

    #[test]
    fn open_fails_for_garbage_data() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("garbage.mp4");
        std::fs::write(&path, b"not a real container").unwrap();

        assert!(VideoPipeline::open(&path).is_err());
    }
}
