//! The real-time entry point.
//!
//! [`Processor::process`] is pure data in, data out: interleaved stereo
//! input, the block's transport state, and an output buffer to fill. Any host
//! (the cpal shim in [`super::host`], a plugin wrapper, a test) drives it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::playback::{PlaybackHandoff, PlaybackReader};
use super::recorder::{SegmentRecorder, SegmentStore};

pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Transport as reported by the host for one block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transport {
    pub is_playing: bool,
    pub bpm: Option<f64>,
}

impl Transport {
    pub fn playing() -> Self {
        Self { is_playing: true, bpm: None }
    }

    pub fn stopped() -> Self {
        Self::default()
    }
}

/// Host facts shared between the callback and everything else, stored as f64 bits.
#[derive(Debug)]
pub struct HostInfo {
    sample_rate: AtomicU64,
    bpm: AtomicU64,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl HostInfo {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate: AtomicU64::new(sample_rate.to_bits()),
            bpm: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Relaxed))
    }

    pub fn set_sample_rate(&self, rate: f64) {
        self.sample_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// Last tempo the host reported, if it ever reported one.
    pub fn bpm(&self) -> Option<f64> {
        let bpm = f64::from_bits(self.bpm.load(Ordering::Relaxed));
        (bpm > 0.0).then_some(bpm)
    }

    fn set_bpm(&self, bpm: f64) {
        self.bpm.store(bpm.to_bits(), Ordering::Relaxed);
    }
}

pub struct Processor {
    host: Arc<HostInfo>,
    recorder: SegmentRecorder,
    playback: PlaybackReader,
}

impl Processor {
    pub fn new(host: Arc<HostInfo>, segments: Arc<SegmentStore>, handoff: Arc<PlaybackHandoff>) -> Self {
        Self {
            host,
            recorder: SegmentRecorder::new(segments),
            playback: PlaybackReader::new(handoff),
        }
    }

    /// Called by the host before streaming starts or when the rate changes.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.host.set_sample_rate(sample_rate);
        self.recorder.prepare(sample_rate);
    }

    pub fn host(&self) -> &Arc<HostInfo> {
        &self.host
    }

    pub fn is_capturing(&self) -> bool {
        self.recorder.is_capturing()
    }

    pub fn queued_playback_frames(&self) -> usize {
        self.playback.queued_frames()
    }

    /// One audio block. No locks waited on, no decoding, no resampling.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], transport: Transport) {
        if let Some(bpm) = transport.bpm {
            self.host.set_bpm(bpm);
        }

        let rate = self.host.sample_rate();
        self.recorder.process(input, transport.is_playing, rate);
        self.playback.render(output);
    }
}
