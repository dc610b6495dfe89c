use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use super::segment::CHANNELS;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio has no frames or no channels")]
    Empty,
    #[error("unsupported sample rate {0}")]
    SampleRate(f64),
}

/// Decoded container contents, interleaved in the container's own channel count.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: f64,
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Interleaved stereo view: mono is duplicated, extra channels are dropped.
    pub fn to_stereo(&self) -> Vec<f32> {
        if self.channels == CHANNELS {
            return self.samples.clone();
        }
        let mut out = Vec::with_capacity(self.frames() * CHANNELS);
        for frame in self.samples.chunks_exact(self.channels.max(1)) {
            let left = frame[0];
            let right = frame.get(1).copied().unwrap_or(left);
            out.push(left);
            out.push(right);
        }
        out
    }
}

/// Encode/decode of the interchange container.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, CodecError>;
    fn encode(&self, samples: &[f32], sample_rate: f64, channels: usize) -> Result<Vec<u8>, CodecError>;
}

/// RIFF/WAV through `hound`. Writes integer PCM at `bits_per_sample`.
#[derive(Debug, Clone, Copy)]
pub struct WavCodec {
    pub bits_per_sample: u16,
}

impl Default for WavCodec {
    fn default() -> Self {
        Self { bits_per_sample: 24 }
    }
}

impl AudioCodec for WavCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, CodecError> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let decoded = DecodedAudio {
            sample_rate: spec.sample_rate as f64,
            channels: spec.channels as usize,
            samples,
        };
        if decoded.channels == 0 || decoded.frames() == 0 {
            return Err(CodecError::Empty);
        }
        Ok(decoded)
    }

    fn encode(&self, samples: &[f32], sample_rate: f64, channels: usize) -> Result<Vec<u8>, CodecError> {
        if channels == 0 || samples.len() < channels {
            return Err(CodecError::Empty);
        }
        if !(sample_rate >= 1.0 && sample_rate <= u32::MAX as f64) {
            return Err(CodecError::SampleRate(sample_rate));
        }

        let spec = WavSpec {
            channels: channels as u16,
            sample_rate: sample_rate.round() as u32,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        let full_scale = ((1i64 << (self.bits_per_sample - 1)) - 1) as f32;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            let whole = samples.len() - samples.len() % channels;
            for &s in &samples[..whole] {
                writer.write_sample((s.clamp(-1.0, 1.0) * full_scale).round() as i32)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}
