use std::sync::Arc;
use uuid::Uuid;

pub const CHANNELS: usize = 2;

/// One finalized transport capture. Samples never change after creation;
/// only the trim window and the display name do.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    samples: Arc<[f32]>,
    pub sample_rate: f64,
    trim_start: usize,
    // None = play to the end
    trim_end: Option<usize>,
}

impl Segment {
    pub fn new(name: String, samples: impl Into<Arc<[f32]>>, sample_rate: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            samples: samples.into(),
            sample_rate,
            trim_start: 0,
            trim_end: None,
        }
    }

    /// Interleaved stereo samples for the whole capture.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    pub fn trim_start(&self) -> usize {
        self.trim_start
    }

    pub fn trim_end(&self) -> Option<usize> {
        self.trim_end
    }

    /// Effective end frame, resolving "unset" to the full length.
    pub fn end_frame(&self) -> usize {
        self.trim_end.unwrap_or_else(|| self.total_frames())
    }

    /// Clamps the requested window into `[0, total]` with `start <= end`.
    pub fn set_trim(&mut self, start: i64, end: Option<i64>) {
        let total = self.total_frames() as i64;
        let start = start.clamp(0, total);
        self.trim_start = start as usize;
        self.trim_end = end.map(|e| e.clamp(start, total) as usize);
    }

    pub fn trimmed_frames(&self) -> usize {
        self.end_frame().saturating_sub(self.trim_start)
    }

    /// Interleaved samples inside the trim window.
    pub fn trimmed_samples(&self) -> &[f32] {
        &self.samples[self.trim_start * CHANNELS..self.end_frame() * CHANNELS]
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.trimmed_frames() as f64 / self.sample_rate
    }
}

/// What the UI needs to draw one row of the segment list.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub id: Uuid,
    pub name: String,
    pub total_frames: usize,
    pub trim_start: usize,
    pub trim_end: Option<usize>,
    pub sample_rate: f64,
    pub duration_seconds: f64,
}

impl From<&Segment> for SegmentInfo {
    fn from(seg: &Segment) -> Self {
        Self {
            id: seg.id,
            name: seg.name.clone(),
            total_frames: seg.total_frames(),
            trim_start: seg.trim_start(),
            trim_end: seg.trim_end(),
            sample_rate: seg.sample_rate,
            duration_seconds: seg.duration_seconds(),
        }
    }
}
