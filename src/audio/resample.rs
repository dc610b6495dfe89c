//! Linear-interpolation sample-rate conversion for interleaved stereo.
//!
//! Runs on the publishing thread only. Its cost scales with the whole
//! input, so it must never be called from the audio callback.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("invalid sample rate (source {source_rate}, target {target_rate})")]
    InvalidRate { source_rate: f64, target_rate: f64 },
    #[error("resampling would produce no output frames")]
    EmptyOutput,
}

/// Number of frames produced when converting `frames` from `source_rate` to `target_rate`.
pub fn output_frames(frames: usize, source_rate: f64, target_rate: f64) -> usize {
    if frames == 0 || !(source_rate > 0.0) || !(target_rate > 0.0) {
        return 0;
    }
    (frames as f64 * target_rate / source_rate).round() as usize
}

/// Resamples interleaved stereo `input` into a freshly allocated buffer.
pub fn resample_stereo(input: &[f32], source_rate: f64, target_rate: f64) -> Result<Vec<f32>, ResampleError> {
    let mut out = Vec::new();
    resample_stereo_into(input, source_rate, target_rate, &mut out)?;
    Ok(out)
}

/// Resamples interleaved stereo `input` into `out`, reusing its allocation.
///
/// Produces `round(N * target / source)` frames. Each output frame is the
/// linear blend of the two neighbouring source frames, per channel; reads past
/// the last source frame clamp to it. Returns the number of frames written.
pub fn resample_stereo_into(
    input: &[f32],
    source_rate: f64,
    target_rate: f64,
    out: &mut Vec<f32>,
) -> Result<usize, ResampleError> {
    if !(source_rate > 0.0) || !(target_rate > 0.0) {
        return Err(ResampleError::InvalidRate { source_rate, target_rate });
    }

    let in_frames = input.len() / 2;
    let out_frames = output_frames(in_frames, source_rate, target_rate);
    if out_frames == 0 {
        return Err(ResampleError::EmptyOutput);
    }

    out.clear();
    out.resize(out_frames * 2, 0.0);

    let step = source_rate / target_rate;
    let last = in_frames - 1;

    for (i, frame) in out.chunks_exact_mut(2).enumerate() {
        let pos = i as f64 * step;
        let i0 = (pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let t = (pos - pos.floor()) as f32;

        for ch in 0..2 {
            let a = input[i0 * 2 + ch];
            let b = input[i1 * 2 + ch];
            frame[ch] = a + (b - a) * t;
        }
    }

    Ok(out_frames)
}
