// SPDX-License-Identifier: MPL-2.0
//! Audio decode pipeline: demux, decode, resample, and ring-buffer fill.
//!
//! FFmpeg contexts are created inside, and never leave, a dedicated worker
//! thread. The worker wakes every [`AUDIO_FILL_INTERVAL`] to top the ring
//! buffer off to half capacity, and handles transport commands in between.
//! Seek and prefill carry an ack channel so they are synchronous from the
//! caller's perspective; the engine's cross-stream seek sequence depends
//! on that ordering.
//!
//! The hardware side of the pipeline lives in [`super::output`]; the two
//! halves meet only at the shared ring buffer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::config::{AUDIO_FILL_INTERVAL, AUDIO_PREFILL_FRAMES, AUDIO_RING_CAPACITY_SAMPLES};
use crate::error::{MediaError, Result};
use crate::player::output::{AudioOutput, OutputSpec};
use crate::player::ring_buffer::AudioRingBuffer;
use crate::player::state::Volume;
use crate::player::video::init_ffmpeg;

/// Audio stream information recorded at open.
#[derive(Debug, Clone)]
pub struct AudioStreamInfo {
    /// Source sample rate in Hz (before resampling).
    pub sample_rate: u32,

    /// Source channel count.
    pub channels: u16,

    /// Total duration in seconds (if known).
    pub duration_secs: Option<f64>,

    /// Audio codec name (e.g., "aac", "mp3", "opus").
    pub codec_name: String,
}

/// State shared between the worker thread and the engine.
///
/// Read without locks; staleness on the order of one fill interval is
/// acceptable for drift estimation.
struct AudioShared {
    /// Last decoded PTS in microseconds.
    current_pts_us: AtomicU64,

    /// Whether the decode side considers playback active. Cleared when the
    /// stream ends so the synchronizer stops treating audio as the
    /// reference clock.
    playing: AtomicBool,
}

impl AudioShared {
    fn new() -> Self {
        Self {
            current_pts_us: AtomicU64::new(0),
            playing: AtomicBool::new(false),
        }
    }

    fn set_current_pts(&self, secs: f64) {
        let micros = (secs.max(0.0) * 1_000_000.0) as u64;
        self.current_pts_us.store(micros, Ordering::Relaxed);
    }

    fn current_pts_secs(&self) -> f64 {
        self.current_pts_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

/// Commands handled by the audio worker thread.
enum AudioCommand {
    /// Begin filling the ring on each tick.
    Play,

    /// Stop filling (buffered audio is left in place).
    Pause,

    /// Rewind the stream; `done` acknowledges completion.
    Seek { target_secs: f64, done: Sender<bool> },

    /// Decode a bounded number of frames ahead of playback start.
    Prefill { done: Sender<bool> },

    /// Exit the worker loop.
    Shutdown,
}

/// Decode half of the audio pipeline. Lives on the worker thread.
struct AudioPipeline {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Audio,
    resampler: ffmpeg_next::software::resampling::Context,
    stream_index: usize,
    time_base_f64: f64,
    spec: OutputSpec,
    ring: Arc<AudioRingBuffer>,
    shared: Arc<AudioShared>,
    info: AudioStreamInfo,
}

impl AudioPipeline {
    /// Opens the audio stream of `path`, configured to resample into the
    /// device format described by `spec`.
    ///
    /// Returns `Ok(None)` when the file has no audio stream.
    fn open(
        path: &Path,
        spec: OutputSpec,
        ring: Arc<AudioRingBuffer>,
        shared: Arc<AudioShared>,
    ) -> Result<Option<Self>> {
        init_ffmpeg()?;

        let ictx = ffmpeg_next::format::input(&path)
            .map_err(|e| MediaError::OpenFailed(format!("{e}")))?;

        let Some(stream) = ictx.streams().best(ffmpeg_next::media::Type::Audio) else {
            return Ok(None);
        };
        let stream_index = stream.index();

        let time_base = stream.time_base();
        let time_base_f64 =
            f64::from(time_base.numerator()) / f64::from(time_base.denominator());

        let duration_secs = if stream.duration() > 0 {
            Some(stream.duration() as f64 * time_base_f64)
        } else if ictx.duration() > 0 {
            Some(ictx.duration() as f64 / 1_000_000.0)
        } else {
            None
        };

        let context_decoder =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| MediaError::UnsupportedCodec(format!("{e}")))?;
        let decoder = context_decoder
            .decoder()
            .audio()
            .map_err(|e| MediaError::UnsupportedCodec(format!("{e}")))?;

        let codec_name = decoder
            .codec()
            .map_or_else(|| "unknown".to_string(), |c| c.name().to_string());

        let info = AudioStreamInfo {
            sample_rate: decoder.rate(),
            channels: decoder.channels() as u16,
            duration_secs,
            codec_name,
        };

        // Resample to interleaved f32 at the device's native rate and
        // channel count; anything beyond stereo is downmixed. Without this
        // the device plays at the wrong pitch or channel order.
        let output_channel_layout = match spec.channels {
            1 => ffmpeg_next::ChannelLayout::MONO,
            _ => ffmpeg_next::ChannelLayout::STEREO,
        };

        let resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
            output_channel_layout,
            spec.sample_rate,
        )
        .map_err(|e| MediaError::DecodeFailed(format!("resampler: {e}")))?;

        log::info!(
            "audio stream: {} ({} Hz, {} ch) -> device {} Hz, {} ch",
            info.codec_name,
            info.sample_rate,
            info.channels,
            spec.sample_rate,
            spec.channels
        );

        Ok(Some(Self {
            input: ictx,
            decoder,
            resampler,
            stream_index,
            time_base_f64,
            spec,
            ring,
            shared,
            info,
        }))
    }

    /// Decodes one frame, resamples it, and appends the PCM to the ring.
    ///
    /// Returns `false` at end of stream. Corrupt packets are skipped; the
    /// ring lock is only taken for the final copy inside `push`, never
    /// across decode or resample work.
    fn decode_frame_into_ring(&mut self) -> bool {
        let decoded = loop {
            let packet = match self.next_stream_packet() {
                Some(packet) => packet,
                None => return false,
            };

            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("skipping undecodable audio packet: {e}");
                continue;
            }

            let mut frame = ffmpeg_next::frame::Audio::empty();
            if self.decoder.receive_frame(&mut frame).is_ok() {
                break frame;
            }
        };

        if let Some(pts) = decoded.pts().or_else(|| decoded.timestamp()) {
            self.shared.set_current_pts(pts as f64 * self.time_base_f64);
        }

        let mut resampled = ffmpeg_next::frame::Audio::empty();
        if let Err(e) = self.resampler.run(&decoded, &mut resampled) {
            log::debug!("skipping unresamplable audio frame: {e}");
            return true;
        }

        let samples = extract_samples(&resampled, self.spec.channels);
        let pushed = self.ring.push(&samples);
        if pushed < samples.len() {
            log::debug!(
                "audio ring full, dropped {} samples",
                samples.len() - pushed
            );
        }

        true
    }

    /// Tops the ring off to half capacity. Returns `false` when the stream
    /// ended before the target was reached.
    fn fill_buffer(&mut self) -> bool {
        let target = self.ring.capacity() / 2;
        while self.ring.available() < target {
            if !self.decode_frame_into_ring() {
                return false;
            }
        }
        true
    }

    /// Decodes a fixed budget of frames ahead of playback start or resume,
    /// so the device does not open onto silence. Returns `false` if the
    /// stream ends first.
    fn prefill_buffer(&mut self) -> bool {
        for _ in 0..AUDIO_PREFILL_FRAMES {
            if !self.decode_frame_into_ring() {
                return false;
            }
        }
        true
    }

    /// Rewinds the stream to `target_secs`.
    ///
    /// Discards buffered PCM, issues a backward container seek, and
    /// flushes the decoder. No forward scan is needed: the next fill
    /// produces audio starting at or after the target, and sub-frame
    /// alignment is inaudible.
    fn seek(&mut self, target_secs: f64) -> Result<()> {
        self.ring.clear();

        let timestamp = (target_secs * 1_000_000.0) as i64;
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|e| MediaError::SeekFailed(format!("{e}")))?;
        self.decoder.flush();
        self.shared.set_current_pts(target_secs);

        Ok(())
    }

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
}

/// Extracts interleaved f32 samples from a resampled frame.
fn extract_samples(frame: &ffmpeg_next::frame::Audio, channels: u16) -> Vec<f32> {
    samples_from_bytes(frame.data(0), frame.samples() * channels as usize)
}

/// Reads `sample_count` packed little-endian f32 values from raw plane
/// bytes. The plane may carry trailing alignment padding; only the
/// declared sample count is consumed.
fn samples_from_bytes(data: &[u8], sample_count: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        let offset = i * 4;
        if offset + 4 <= data.len() {
            let bytes = [
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ];
            samples.push(f32::from_le_bytes(bytes));
        }
    }

    samples
}

/// Worker entry point: opens the pipeline, reports readiness, then
/// alternates between command handling and periodic ring fills.
fn worker_loop(
    path: PathBuf,
    spec: OutputSpec,
    ring: Arc<AudioRingBuffer>,
    shared: Arc<AudioShared>,
    commands: Receiver<AudioCommand>,
    ready: Sender<Result<Option<AudioStreamInfo>>>,
) {
    let mut pipeline = match AudioPipeline::open(&path, spec, ring, Arc::clone(&shared)) {
        Ok(Some(pipeline)) => {
            let _ = ready.send(Ok(Some(pipeline.info.clone())));
            pipeline
        }
        Ok(None) => {
            let _ = ready.send(Ok(None));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut filling = false;
    loop {
        match commands.recv_timeout(AUDIO_FILL_INTERVAL) {
            Ok(AudioCommand::Play) => {
                filling = true;
                shared.set_playing(true);
            }
            Ok(AudioCommand::Pause) => {
                filling = false;
                shared.set_playing(false);
            }
            Ok(AudioCommand::Seek { target_secs, done }) => {
                let ok = match pipeline.seek(target_secs) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("audio seek failed: {e}");
                        false
                    }
                };
                let _ = done.send(ok);
            }
            Ok(AudioCommand::Prefill { done }) => {
                let _ = done.send(pipeline.prefill_buffer());
            }
            Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if filling && !pipeline.fill_buffer() {
                    // Stream ended. Stop decoding until a seek rewinds the
                    // container, and stop acting as the reference clock.
                    filling = false;
                    shared.set_playing(false);
                }
            }
        }
    }
}

/// Engine-side handle to the audio pipeline.
///
/// Owns the output device, the ring buffer, and the worker thread. All
/// transport methods are called from the engine thread; seek and prefill
/// block until the worker acknowledges them.
pub struct AudioHandle {
    command_tx: Sender<AudioCommand>,
    output: AudioOutput,
    ring: Arc<AudioRingBuffer>,
    shared: Arc<AudioShared>,
    info: AudioStreamInfo,
    worker: Option<JoinHandle<()>>,
}

impl AudioHandle {
    /// Opens audio playback for `path`.
    ///
    /// Returns `Ok(None)` when the file has no audio stream; playback then
    /// proceeds silently. Device or stream-open failures are returned as
    /// errors for the caller to degrade on.
    ///
    /// # Errors
    ///
    /// Returns an error if the output device cannot be initialized or the
    /// audio stream cannot be opened for decoding.
    pub fn open<P: AsRef<Path>>(path: P, initial_volume: Volume) -> Result<Option<Self>> {
        let ring = Arc::new(AudioRingBuffer::new(AUDIO_RING_CAPACITY_SAMPLES));
        let output = AudioOutput::new(Arc::clone(&ring), initial_volume)?;
        let spec = output.spec();

        let shared = Arc::new(AudioShared::new());
        let (command_tx, command_rx) = bounded(16);
        let (ready_tx, ready_rx) = bounded(1);

        let worker = std::thread::Builder::new().name("audio-fill".into()).spawn({
            let ring = Arc::clone(&ring);
            let shared = Arc::clone(&shared);
            let path = path.as_ref().to_path_buf();
            move || worker_loop(path, spec, ring, shared, command_rx, ready_tx)
        })?;

        match ready_rx.recv() {
            Ok(Ok(Some(info))) => Ok(Some(Self {
                command_tx,
                output,
                ring,
                shared,
                info,
                worker: Some(worker),
            })),
            Ok(Ok(None)) => {
                let _ = worker.join();
                Ok(None)
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(MediaError::OpenFailed("audio worker exited during open".into()).into())
            }
        }
    }

    /// Starts the device and the fill loop.
    pub fn play(&self) {
        self.send(AudioCommand::Play);
        self.output.resume();
    }

    /// Pauses the device; buffered audio survives for resume.
    pub fn pause(&self) {
        self.send(AudioCommand::Pause);
        self.output.pause();
    }

    /// Stops the device and discards buffered audio.
    pub fn stop(&self) {
        self.send(AudioCommand::Pause);
        self.output.stop();
    }

    /// Rewinds the stream to `target_secs`. Pauses the device first;
    /// blocks until the worker has reset the container and the buffer.
    pub fn seek(&self, target_secs: f64) -> bool {
        self.output.pause();

        let (done_tx, done_rx) = bounded(1);
        self.send(AudioCommand::Seek {
            target_secs,
            done: done_tx,
        });
        done_rx.recv().unwrap_or(false)
    }

    /// Decodes a prefill budget ahead of playback; blocks until done.
    /// Returns `false` when the stream ended before the budget was met.
    pub fn prefill(&self) -> bool {
        let (done_tx, done_rx) = bounded(1);
        self.send(AudioCommand::Prefill { done: done_tx });
        done_rx.recv().unwrap_or(false)
    }

    /// Last decoded PTS in seconds, the audio-side time reference.
    #[must_use]
    pub fn current_time_secs(&self) -> f64 {
        self.shared.current_pts_secs()
    }

    /// Duration of buffered-but-unplayed audio.
    ///
    /// Approximates how far the decode cursor runs ahead of the hardware;
    /// subtracted from [`current_time_secs`](Self::current_time_secs) it
    /// estimates the audible playback position.
    #[must_use]
    pub fn latency_secs(&self) -> f64 {
        let spec = self.output.spec();
        self.ring.available() as f64 / (f64::from(spec.sample_rate) * f64::from(spec.channels))
    }

    /// Whether the decode side is active (stream not ended, not paused).
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Source stream information.
    #[must_use]
    pub fn info(&self) -> &AudioStreamInfo {
        &self.info
    }

    /// Sets the playback volume.
    pub fn set_volume(&self, volume: Volume) {
        self.output.set_volume(volume);
    }

    /// Sets the mute state.
    pub fn set_muted(&self, muted: bool) {
        self.output.set_muted(muted);
    }

    /// Stops the worker and joins it. Must complete before decode contexts
    /// or the device are torn down; called by `Drop` as a backstop.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.command_tx.send(AudioCommand::Shutdown);
            if worker.join().is_err() {
                log::warn!("audio worker panicked during shutdown");
            }
        }
    }

    fn send(&self, command: AudioCommand) {
        // A dead worker means audio already degraded to silence; transport
        // commands become no-ops rather than errors.
        if self.command_tx.send(command).is_err() {
            log::warn!("audio worker unavailable, command dropped");
        }
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_shared_tracks_pts() {
        let shared = AudioShared::new();
        assert_eq!(shared.current_pts_secs(), 0.0);

        shared.set_current_pts(15.5);
        assert!((shared.current_pts_secs() - 15.5).abs() < 1e-6);

        // Negative values clamp to zero rather than wrapping.
        shared.set_current_pts(-1.0);
        assert_eq!(shared.current_pts_secs(), 0.0);
    }

    #[test]
    fn audio_shared_playing_flag() {
        let shared = AudioShared::new();
        assert!(!shared.is_playing());

        shared.set_playing(true);
        assert!(shared.is_playing());

        shared.set_playing(false);
        assert!(!shared.is_playing());
    }

    #[test]
    fn audio_stream_info_stores_metadata() {
        let info = AudioStreamInfo {
            sample_rate: 44_100,
            channels: 2,
            duration_secs: Some(180.5),
            codec_name: "aac".to_string(),
        };

        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.duration_secs, Some(180.5));
        assert_eq!(info.codec_name, "aac");
    }

    #[test]
    fn samples_from_bytes_reads_packed_f32() {
        let values = [0.25f32, -0.5, 1.0, 0.0];
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let samples = samples_from_bytes(&bytes, 4);
        assert_eq!(samples, values);
    }

    #[test]
    fn samples_from_bytes_ignores_alignment_padding() {
        let mut bytes = Vec::new();
        for v in [0.1f32, 0.2] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 24]); // plane padding

        let samples = samples_from_bytes(&bytes, 2);
        assert_eq!(samples, [0.1, 0.2]);
    }

    #[test]
    fn samples_from_bytes_truncates_at_short_planes() {
        let bytes = 1.0f32.to_le_bytes();
        // Declared count exceeds the plane; the tail is dropped, not read
        // out of bounds.
        let samples = samples_from_bytes(&bytes, 3);
        assert_eq!(samples, [1.0]);
    }
}
