//! Standalone host shim: runs a [`Processor`] on the default cpal devices.
//!
//! This is the only place that knows about a concrete audio API. Transport
//! state comes from [`HostTransport`], which the console driver toggles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{error, info, warn};

use super::processor::{Processor, Transport};
use super::segment::CHANNELS;

/// Largest slice handed to the processor at once; bigger device buffers are split.
const MAX_CHUNK_FRAMES: usize = 4096;
const INPUT_RING_FRAMES: usize = 16_384;

/// Play/stop flag standing in for a DAW transport.
#[derive(Debug, Default)]
pub struct HostTransport {
    playing: AtomicBool,
}

impl HostTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

pub struct CpalHost {
    _output: cpal::Stream,
    _input: Option<cpal::Stream>,
    pub sample_rate: u32,
}

impl CpalHost {
    pub fn start(mut processor: Processor, transport: Arc<HostTransport>) -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("No output device available"))?;
        info!("Audio Output Device: {}", device.name().unwrap_or_default());

        let supported = device.default_output_config()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow::anyhow!(
                "Unsupported output sample format: {:?}",
                supported.sample_format()
            ));
        }
        let config: cpal::StreamConfig = supported.config();
        let sample_rate = config.sample_rate.0;
        let out_channels = config.channels as usize;
        info!("Audio Config Selected: Rate={}Hz, Channels={}", sample_rate, out_channels);

        processor.prepare(sample_rate as f64);

        let rb = HeapRb::<f32>::new(INPUT_RING_FRAMES * CHANNELS);
        let (producer, mut consumer) = rb.split();
        let input = match open_input(&host, sample_rate, producer) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Running without audio input: {}", e);
                None
            }
        };

        let mut scratch_in = vec![0.0f32; MAX_CHUNK_FRAMES * CHANNELS];
        let mut scratch_out = vec![0.0f32; MAX_CHUNK_FRAMES * CHANNELS];
        let err_fn = |err| error!("an error occurred on output stream: {}", err);

        let output = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / out_channels.max(1);
                let mut done = 0;
                while done < frames {
                    let n = (frames - done).min(MAX_CHUNK_FRAMES);
                    let inp = &mut scratch_in[..n * CHANNELS];
                    let got = consumer.pop_slice(inp);
                    inp[got..].fill(0.0);

                    let out = &mut scratch_out[..n * CHANNELS];
                    let block_transport = Transport {
                        is_playing: transport.is_playing(),
                        bpm: None,
                    };
                    processor.process(inp, out, block_transport);

                    let dest = &mut data[done * out_channels..(done + n) * out_channels];
                    for (frame, src) in dest.chunks_exact_mut(out_channels).zip(out.chunks_exact(CHANNELS)) {
                        for (c, sample) in frame.iter_mut().enumerate() {
                            *sample = if c < CHANNELS { src[c] } else { 0.0 };
                        }
                    }
                    done += n;
                }
            },
            err_fn,
            None,
        )?;

        output.play()?;
        if let Some(stream) = &input {
            stream.play()?;
        }

        Ok(Self {
            _output: output,
            _input: input,
            sample_rate,
        })
    }
}

fn open_input<P>(host: &cpal::Host, sample_rate: u32, mut producer: P) -> Result<cpal::Stream, anyhow::Error>
where
    P: Producer<Item = f32> + Send + 'static,
{
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("No input device available"))?;
    info!("Audio Input Device: {}", device.name().unwrap_or_default());

    let default = device.default_input_config()?;
    if default.sample_format() != cpal::SampleFormat::F32 {
        return Err(anyhow::anyhow!("Unsupported input sample format"));
    }
    let channels = default.channels() as usize;
    let config = cpal::StreamConfig {
        channels: default.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("an error occurred on input stream: {}", err);
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| write_input_data(data, channels, &mut producer),
        err_fn,
        None,
    )?;
    Ok(stream)
}

fn write_input_data<P>(input: &[f32], channels: usize, producer: &mut P)
where
    P: Producer<Item = f32>,
{
    // Lossy when the output side falls behind.
    for frame in input.chunks_exact(channels.max(1)) {
        if producer.vacant_len() < CHANNELS {
            return;
        }
        let left = frame[0];
        let right = frame.get(1).copied().unwrap_or(left);
        let _ = producer.try_push(left);
        let _ = producer.try_push(right);
    }
}
