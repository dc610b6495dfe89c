//! Handoff of generated audio from the completion step to the audio callback.
//!
//! Two frame buffers sit behind one atomic state word. The publisher fills
//! the slot the callback is not reading, then flips the published index and
//! raises the ready flag in a single release CAS. The callback claims the
//! published slot with an acquire CAS, copies it into its own ring buffer and
//! releases the claim. The callback never blocks: the only side that may wait
//! is the publisher, and only while the callback is mid-copy of the slot it
//! wants to overwrite.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use tracing::{debug, warn};

use super::processor::HostInfo;
use super::resample::{resample_stereo_into, ResampleError};
use super::segment::CHANNELS;

/// Default ring capacity in frames.
pub const DEFAULT_CAPACITY_FRAMES: usize = 1 << 20;

// State word layout.
const READY: u32 = 0b0001;
const PUBLISHED: u32 = 0b0010; // index of the last published slot
const BUSY: u32 = 0b0100; // callback is copying a slot
const READING: u32 = 0b1000; // index of the slot being copied

fn published_index(state: u32) -> usize {
    ((state & PUBLISHED) >> 1) as usize
}

fn reading_index(state: u32) -> usize {
    ((state & READING) >> 3) as usize
}

/// Outcome of a successful [`PlaybackHandoff::publish`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishReport {
    pub frames: usize,
    pub host_rate: f64,
    pub truncated: bool,
}

pub struct PlaybackHandoff {
    slots: [UnsafeCell<Vec<f32>>; 2],
    state: AtomicU32,
    // Serialises publishers; never touched by the callback.
    writer: Mutex<()>,
    host: Arc<HostInfo>,
    capacity_frames: usize,
}

// Safety: a slot is written only by the single publisher holding `writer`,
// and only when the state word shows the callback is not copying it. The
// callback reads a slot only between claiming and releasing it through `state`.
unsafe impl Send for PlaybackHandoff {}
unsafe impl Sync for PlaybackHandoff {}

impl PlaybackHandoff {
    pub fn new(host: Arc<HostInfo>, capacity_frames: usize) -> Self {
        Self {
            slots: [UnsafeCell::new(Vec::new()), UnsafeCell::new(Vec::new())],
            state: AtomicU32::new(0),
            writer: Mutex::new(()),
            host,
            capacity_frames: capacity_frames.max(1),
        }
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// True while a published buffer has not been picked up by the callback yet.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) & READY != 0
    }

    /// Resamples interleaved stereo `samples` to the host rate and makes them
    /// the next thing the callback plays. Non-real-time threads only.
    pub fn publish(&self, samples: &[f32], source_rate: f64) -> Result<PublishReport, ResampleError> {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let host_rate = self.host.sample_rate();

        let target = loop {
            let state = self.state.load(Ordering::Acquire);
            let target = 1 - published_index(state);
            if state & BUSY != 0 && reading_index(state) == target {
                std::thread::yield_now();
                continue;
            }
            break target;
        };

        // Safety: see the impl Sync note. `target` is neither published nor being copied.
        let slot = unsafe { &mut *self.slots[target].get() };
        let mut frames = resample_stereo_into(samples, source_rate, host_rate, slot)?;
        let truncated = frames > self.capacity_frames;
        if truncated {
            warn!(
                "Generated audio is {} frames, playback holds {}; truncating",
                frames, self.capacity_frames
            );
            frames = self.capacity_frames;
            slot.truncate(frames * CHANNELS);
        }

        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
            Some((state & (BUSY | READING)) | READY | ((target as u32) << 1))
        });
        debug!("Published {} frames at {}Hz into slot {}", frames, host_rate, target);

        Ok(PublishReport {
            frames,
            host_rate,
            truncated,
        })
    }

    /// Claims the freshly published slot, if any. Audio thread only.
    fn claim(&self) -> Option<usize> {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & READY == 0 {
                return None;
            }
            let index = published_index(state);
            let claimed = (state & !(READY | READING)) | BUSY | ((index as u32) << 3);
            match self
                .state
                .compare_exchange_weak(state, claimed, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(index),
                Err(current) => state = current,
            }
        }
    }

    fn release(&self) {
        self.state.fetch_and(!BUSY, Ordering::Release);
    }
}

/// Audio-thread consumer: a ring buffer refilled from the handoff and drained one block at a time.
pub struct PlaybackReader {
    handoff: Arc<PlaybackHandoff>,
    ring: HeapRb<f32>,
}

impl PlaybackReader {
    /// Allocates the ring. Call outside the callback.
    pub fn new(handoff: Arc<PlaybackHandoff>) -> Self {
        let ring = HeapRb::new(handoff.capacity_frames() * CHANNELS);
        Self { handoff, ring }
    }

    pub fn queued_frames(&self) -> usize {
        self.ring.occupied_len() / CHANNELS
    }

    /// Writes the next block of playback into interleaved stereo `output`,
    /// zero-filling whatever the ring cannot supply. Returns frames played.
    pub fn render(&mut self, output: &mut [f32]) -> usize {
        if let Some(index) = self.handoff.claim() {
            // Safety: the slot stays untouched by the publisher until `release`.
            let slot = unsafe { &*self.handoff.slots[index].get() };
            self.ring.clear();
            self.ring.push_slice(slot);
            self.handoff.release();
        }

        let whole = output.len() - output.len() % CHANNELS;
        let read = self.ring.pop_slice(&mut output[..whole]);
        let read = read - read % CHANNELS;
        output[read..].fill(0.0);
        read / CHANNELS
    }
}
