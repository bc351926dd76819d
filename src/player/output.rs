// SPDX-License-Identifier: MPL-2.0
//! Audio output using cpal.
//!
//! Wraps the hardware playback stream. The device callback runs on a
//! real-time thread outside application control and must complete in
//! bounded time: it drains the shared ring buffer, applies gain, and
//! nothing else: no decode, no allocation, no I/O. Insufficient data is
//! covered with silence; blocking the callback would cause audible
//! dropouts across the whole device, not just this stream.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{MediaError, Result};
use crate::player::ring_buffer::AudioRingBuffer;
use crate::player::state::Volume;

/// Gain and transport state shared with the device callback.
struct SharedState {
    /// Current volume (stored as u32 bits of f32 for atomic access).
    volume_bits: AtomicU32,

    /// Mute state. Muted playback still consumes the ring so media time
    /// keeps advancing.
    muted: AtomicBool,

    /// Pause state. While paused the callback emits silence without
    /// touching the ring, so buffered audio survives a pause.
    paused: AtomicBool,
}

impl SharedState {
    fn new(initial_volume: f32) -> Self {
        Self {
            volume_bits: AtomicU32::new(initial_volume.to_bits()),
            muted: AtomicBool::new(false),
            paused: AtomicBool::new(true),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

/// Output format the resampler must produce.
#[derive(Debug, Clone, Copy)]
pub struct OutputSpec {
    /// Device-native sample rate in Hz.
    pub sample_rate: u32,

    /// Device-native channel count.
    pub channels: u16,
}

/// Audio output stream bound to the shared ring buffer.
///
/// The stream object is not `Send`; it lives on the thread that created
/// it (the engine's) for its whole lifetime. Starting the device paused
/// and modeling pause as silence keeps transport control portable across
/// cpal hosts that lack native pause support.
pub struct AudioOutput {
    shared_state: Arc<SharedState>,
    ring: Arc<AudioRingBuffer>,
    spec: OutputSpec,

    /// The audio stream (kept alive to maintain playback).
    _stream: cpal::Stream,
}

impl AudioOutput {
    /// Opens the default output device and starts a stream that drains
    /// `ring`.
    ///
    /// The returned output starts paused (emitting silence); call
    /// [`resume`](Self::resume) once the ring is prefilled.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device exists, its configuration
    /// cannot be read, or the stream fails to build or start.
    pub fn new(ring: Arc<AudioRingBuffer>, initial_volume: Volume) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MediaError::DeviceInit("no audio output device found".into()))?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| MediaError::DeviceInit(format!("failed to get audio config: {e}")))?;

        let spec = OutputSpec {
            sample_rate: supported_config.sample_rate(),
            channels: supported_config.channels(),
        };

        let shared_state = Arc::new(SharedState::new(initial_volume.value()));

        let stream = match supported_config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &supported_config.into(),
                Arc::clone(&ring),
                Arc::clone(&shared_state),
            )?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &supported_config.into(),
                Arc::clone(&ring),
                Arc::clone(&shared_state),
            )?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &supported_config.into(),
                Arc::clone(&ring),
                Arc::clone(&shared_state),
            )?,
            other => {
                return Err(MediaError::DeviceInit(format!(
                    "unsupported audio sample format: {other:?}"
                ))
                .into())
            }
        };

        stream
            .play()
            .map_err(|e| MediaError::DeviceInit(format!("failed to start audio stream: {e}")))?;

        log::info!(
            "audio output: {} Hz, {} channel(s)",
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            shared_state,
            ring,
            spec,
            _stream: stream,
        })
    }

    /// Builds an output stream for a specific device sample format.
    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        ring: Arc<AudioRingBuffer>,
        shared_state: Arc<SharedState>,
    ) -> Result<cpal::Stream> {
        // Scratch reused across callbacks; resized within capacity so the
        // callback does not allocate in steady state.
        let mut scratch: Vec<f32> = Vec::with_capacity(16_384);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if shared_state.is_paused() {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    scratch.resize(data.len(), 0.0);
                    ring.read(&mut scratch);

                    // Perceptual volume curve (quadratic): human hearing is
                    // logarithmic, so a squared slider value feels linear.
                    let volume = shared_state.volume();
                    let gain = if shared_state.is_muted() {
                        0.0
                    } else {
                        volume * volume
                    };

                    for (sample, &value) in data.iter_mut().zip(scratch.iter()) {
                        // Clamping slightly below 1.0 prevents i16 overflow
                        // in from_sample at exactly full scale.
                        let scaled = (value * gain).clamp(-1.0, 0.999_999_9);
                        *sample = T::from_sample(scaled);
                    }
                },
                |err| {
                    log::warn!("audio output error: {err}");
                },
                None,
            )
            .map_err(|e| MediaError::DeviceInit(format!("failed to build audio stream: {e}")))?;

        Ok(stream)
    }

    /// Resumes playback (the callback starts consuming the ring again).
    pub fn resume(&self) {
        self.shared_state.set_paused(false);
    }

    /// Pauses playback, leaving buffered audio in the ring.
    pub fn pause(&self) {
        self.shared_state.set_paused(true);
    }

    /// Stops playback and discards buffered audio.
    pub fn stop(&self) {
        self.shared_state.set_paused(true);
        self.ring.clear();
    }

    /// Sets the playback volume.
    pub fn set_volume(&self, volume: Volume) {
        self.shared_state.set_volume(volume.value());
    }

    /// Sets the mute state.
    pub fn set_muted(&self, muted: bool) {
        self.shared_state.set_muted(muted);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared_state.is_paused()
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.shared_state.is_muted()
    }

    /// Format the resampler must produce for this device.
    #[must_use]
    pub fn spec(&self) -> OutputSpec {
        self.spec
    }
}
