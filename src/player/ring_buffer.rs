// SPDX-License-Identifier: MPL-2.0
//! Fixed-capacity sample ring buffer shared between the audio decode task
//! and the hardware output callback.
//!
//! The producer (decode) appends resampled PCM; the consumer (the device
//! callback, running on a real-time thread) drains it at the hardware
//! cadence. A single mutex guards both cursors and the storage; every
//! critical section is bounded by the number of samples copied, never by
//! decode or I/O.

use std::sync::Mutex;

/// Cursor state and storage, guarded together by one lock.
struct RingState {
    /// Linear sample storage. Unread data lives in `read_pos..write_pos`.
    samples: Vec<f32>,

    /// Next write offset. Only the producer advances this.
    write_pos: usize,

    /// Next read offset. Only the consumer advances this.
    read_pos: usize,
}

/// Fixed-capacity f32 ring buffer with independent producer and consumer
/// cursors.
///
/// Invariants, which hold at every observation point:
/// `read_pos <= write_pos <= capacity`, and unread data is never
/// overwritten: a push that does not fit is truncated, not wrapped.
///
/// Rather than wrapping cursors, unread samples are compacted to offset 0
/// once the read cursor crosses half capacity. Compaction happens on the
/// consumer side, inside the same critical section as the copy-out, so
/// the producer only ever appends.
pub struct AudioRingBuffer {
    state: Mutex<RingState>,
    capacity: usize,
}

impl AudioRingBuffer {
    /// Creates a ring buffer holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                samples: vec![0.0; capacity],
                write_pos: 0,
                read_pos: 0,
            }),
            capacity,
        }
    }

    /// Returns the fixed capacity in samples.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of unread samples currently buffered.
    #[must_use]
    pub fn available(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.write_pos - state.read_pos
    }

    /// Appends samples, producer side.
    ///
    /// Writes as many samples as fit between the write cursor and the end
    /// of storage and returns how many were accepted. Samples that do not
    /// fit are dropped rather than overwriting unread data; the fill loop
    /// checks `available()` against its target before decoding more.
    pub fn push(&self, samples: &[f32]) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let room = self.capacity - state.write_pos;
        let count = samples.len().min(room);
        let write_pos = state.write_pos;
        state.samples[write_pos..write_pos + count].copy_from_slice(&samples[..count]);
        state.write_pos += count;

        count
    }

    /// Drains samples into `out`, consumer side.
    ///
    /// Copies what is buffered, zero-fills the remainder of `out` (silence
    /// on underrun; this never blocks), and returns the number of real
    /// samples copied. When the read cursor has crossed half capacity the
    /// unread tail is compacted to offset 0 before the lock is released.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let available = state.write_pos - state.read_pos;
        let count = out.len().min(available);
        let read_pos = state.read_pos;
        out[..count].copy_from_slice(&state.samples[read_pos..read_pos + count]);
        out[count..].fill(0.0);
        state.read_pos += count;

        if state.read_pos >= self.capacity / 2 {
            let (read_pos, write_pos) = (state.read_pos, state.write_pos);
            state.samples.copy_within(read_pos..write_pos, 0);
            state.write_pos = write_pos - read_pos;
            state.read_pos = 0;
        }

        count
    }

    /// Resets both cursors, discarding buffered audio.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.write_pos = 0;
        state.read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_empty() {
        let ring = AudioRingBuffer::new(64);
        assert_eq!(ring.capacity(), 64);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn push_then_read_round_trips_samples() {
        let ring = AudioRingBuffer::new(64);
        let written = ring.push(&[1.0, 2.0, 3.0]);
        assert_eq!(written, 3);
        assert_eq!(ring.available(), 3);

        let mut out = [0.0f32; 3];
        let read = ring.read(&mut out);
        assert_eq!(read, 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn underrun_zero_fills_remainder() {
        let ring = AudioRingBuffer::new(64);
        ring.push(&[0.5, 0.5]);

        let mut out = [9.0f32; 6];
        let read = ring.read(&mut out);
        assert_eq!(read, 2);
        assert_eq!(out, [0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn read_from_empty_is_pure_silence() {
        let ring = AudioRingBuffer::new(16);
        let mut out = [7.0f32; 8];
        assert_eq!(ring.read(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn push_never_overwrites_unread_data() {
        let ring = AudioRingBuffer::new(8);
        assert_eq!(ring.push(&[1.0; 6]), 6);
        // Only two slots of storage remain; the rest is dropped.
        assert_eq!(ring.push(&[2.0; 4]), 2);
        assert_eq!(ring.available(), 8);

        let mut out = [0.0f32; 8];
        assert_eq!(ring.read(&mut out), 8);
        assert_eq!(&out[..6], &[1.0; 6]);
        assert_eq!(&out[6..], &[2.0; 2]);
    }

    #[test]
    fn compaction_reclaims_space_after_half_capacity_read() {
        let ring = AudioRingBuffer::new(8);
        ring.push(&[1.0; 8]);

        // Reading past half capacity compacts, so a full ring becomes
        // writable again without wrapping.
        let mut out = [0.0f32; 5];
        ring.read(&mut out);
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.push(&[2.0; 5]), 5);
        assert_eq!(ring.available(), 8);

        let mut rest = [0.0f32; 8];
        assert_eq!(ring.read(&mut rest), 8);
        assert_eq!(&rest[..3], &[1.0; 3]);
        assert_eq!(&rest[3..], &[2.0; 5]);
    }

    #[test]
    fn clear_discards_buffered_audio() {
        let ring = AudioRingBuffer::new(16);
        ring.push(&[1.0; 10]);
        ring.clear();
        assert_eq!(ring.available(), 0);

        // Cursor reset means full capacity is writable again.
        assert_eq!(ring.push(&[2.0; 16]), 16);
    }

    #[test]
    fn cursors_stay_ordered_under_arbitrary_interleaving() {
        // Deterministic pseudo-random interleaving of pushes and reads;
        // available() must never exceed capacity and reads must never
        // return more than was written.
        let ring = AudioRingBuffer::new(256);
        let mut seed = 0x2545_f491u32;
        let mut written_total = 0usize;
        let mut read_total = 0usize;

        for _ in 0..10_000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let len = (seed % 64) as usize;

            if seed & 1 == 0 {
                written_total += ring.push(&vec![1.0; len]);
            } else {
                let mut out = vec![0.0f32; len];
                read_total += ring.read(&mut out);
            }

            let available = ring.available();
            assert!(available <= ring.capacity());
            assert_eq!(available, written_total - read_total);
        }
    }

    #[test]
    fn concurrent_producer_and_consumer_never_lose_ordering() {
        // A writer thread pushes a monotonically increasing sequence while
        // a reader drains; the reader must observe the sequence in order
        // with silence (zeros) interleaved on underrun.
        let ring = Arc::new(AudioRingBuffer::new(1024));
        let writer_ring = Arc::clone(&ring);

        let writer = std::thread::spawn(move || {
            let mut next = 1.0f32;
            while next <= 20_000.0 {
                let chunk: Vec<f32> = (0..128).map(|i| next + i as f32).collect();
                let pushed = writer_ring.push(&chunk);
                next += pushed as f32;
                if pushed == 0 {
                    std::thread::yield_now();
                }
            }
        });

        let mut last_seen = 0.0f32;
        let mut out = [0.0f32; 96];
        while last_seen < 20_000.0 {
            let count = ring.read(&mut out);
            for &sample in &out[..count] {
                assert!(sample > last_seen, "samples out of order");
                last_seen = sample;
            }
        }

        writer.join().unwrap();
    }
}
