//! CPAL output stream driven by a [`HostBufferCycle`].
//!
//! CPAL pulls device-format samples; the bridge produces big-endian PCM host
//! buffers. The callback:
//! - plays out samples left from previously submitted host buffers
//! - asks the cycle for another buffer when it runs dry (one bridge fill each)
//! - converts packed big-endian PCM to the device sample format
//! - pads with silence on underrun or end of stream
//! - stops filling once the callback's own playback time has been spent
//!
//! Submitted buffers play back to back, the way a host audio queue plays
//! short buffers without gaps.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::config::frames_duration;
use crate::format::PcmFormat;
use crate::host::{HostBuffer, HostBufferCycle, HostSink};
use crate::staging::FillOutcome;

/// Optional knobs for the output callback.
#[derive(Clone, Debug, Default)]
pub struct OutputOptions {
    /// When set and `true`, the callback outputs silence and does not fill.
    pub paused: Option<Arc<AtomicBool>>,
    /// When set, incremented by the number of frames played from the bridge.
    pub played_frames: Option<Arc<AtomicU64>>,
}

/// A running (or paused) CPAL stream fed from the bridge.
pub struct BridgeOutput {
    stream: cpal::Stream,
    finished: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl BridgeOutput {
    pub fn play(&self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.stream.pause()?;
        Ok(())
    }

    /// `true` once the bridge reported closed and every queued sample played.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// `true` once the stream reported an error it cannot recover from; the
    /// callback will not run again.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// Prime `cycle` and build a CPAL output stream around it.
///
/// `config.channels` must equal the bridge's channel count; see
/// [`crate::device::pick_output_config`]. The stream is created paused; call
/// [`BridgeOutput::play`].
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mut cycle: HostBufferCycle,
    opts: OutputOptions,
) -> Result<BridgeOutput> {
    let format = cycle.format();
    if config.channels != format.channels {
        return Err(anyhow!(
            "stream has {} channels but bridge format is {format}",
            config.channels
        ));
    }

    let mut feed = DeviceFeed::new(format, cycle.frames_per_buffer() * cycle.buffer_count());
    cycle.prime(&mut feed);

    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, cycle, feed, opts),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, cycle, feed, opts),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, cycle, feed, opts),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, cycle, feed, opts),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut cycle: HostBufferCycle,
    mut feed: DeviceFeed,
    opts: OutputOptions,
) -> Result<BridgeOutput>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate;
    let finished = Arc::new(AtomicBool::new(false));
    let finished_cb = finished.clone();
    let failed = Arc::new(AtomicBool::new(false));
    let failed_cb = failed.clone();
    let paused_flag = opts.paused.clone();
    let played_frames = opts.played_frames.clone();

    let err_fn = move |err: cpal::StreamError| {
        tracing::warn!("stream error: {err}");
        if is_fatal(&err) {
            failed_cb.store(true, Ordering::Release);
        }
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if let Some(p) = &paused_flag {
                if p.load(Ordering::Relaxed) {
                    data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                    return;
                }
            }

            let deadline = Instant::now() + frames_duration(data.len() / channels, sample_rate);
            let pass = render(data, channels, &mut cycle, &mut feed, deadline);

            if let Some(counter) = &played_frames {
                if pass.frames > 0 {
                    counter.fetch_add(pass.frames as u64, Ordering::Relaxed);
                }
            }
            if pass.underrun {
                tracing::trace!(fills = pass.fills, frames = pass.frames, "render pass underran");
            }
            if pass.finished {
                finished_cb.store(true, Ordering::Release);
            }
        },
        err_fn,
        None,
    )?;
    stream.pause()?;

    Ok(BridgeOutput {
        stream,
        finished,
        failed,
    })
}

fn is_fatal(err: &cpal::StreamError) -> bool {
    matches!(
        err,
        cpal::StreamError::DeviceNotAvailable | cpal::StreamError::StreamInvalidated
    )
}

/// What one render pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct RenderPass {
    /// Frames played from the bridge; the rest of the output is silence.
    frames: usize,
    fills: usize,
    underrun: bool,
    finished: bool,
}

/// Fill one device callback from `feed`, running bridge fills as it runs dry.
///
/// Stops filling on underrun, on close, after one fill per pool buffer, or
/// once `deadline` has passed. Only whole frames are written; everything
/// after them is silence.
fn render<T>(
    data: &mut [T],
    channels: usize,
    cycle: &mut HostBufferCycle,
    feed: &mut DeviceFeed,
    deadline: Instant,
) -> RenderPass
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let wanted = data.len() / channels;
    let max_fills = cycle.buffer_count();
    let mut pass = RenderPass::default();

    while pass.frames < wanted {
        if feed.samples.len() >= channels {
            let at = pass.frames * channels;
            for (out, s) in data[at..at + channels]
                .iter_mut()
                .zip(feed.samples.drain(..channels))
            {
                *out = <T as cpal::Sample>::from_sample::<f32>(s);
            }
            pass.frames += 1;
            continue;
        }
        if feed.closed || pass.fills == max_fills {
            break;
        }
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            break;
        }
        pass.fills += 1;
        if cycle.service_within(feed, budget).is_underrun() {
            pass.underrun = true;
            break;
        }
    }

    data[pass.frames * channels..].fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
    pass.finished = feed.closed && feed.samples.is_empty();
    pass
}

/// Samples from submitted host buffers waiting to be played.
struct DeviceFeed {
    samples: VecDeque<f32>,
    closed: bool,
}

impl DeviceFeed {
    /// Pre-size for the whole pool so submits never reallocate on the
    /// callback thread.
    fn new(format: PcmFormat, pool_frames: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(pool_frames * format.channels as usize),
            closed: false,
        }
    }
}

impl HostSink for DeviceFeed {
    fn submit(&mut self, buffer: &HostBuffer, outcome: FillOutcome) {
        if outcome == FillOutcome::Closed {
            self.closed = true;
        }
        let width = buffer.format().sample_width.bytes();
        self.samples
            .extend(buffer.as_bytes().chunks_exact(width).map(pcm_be_to_f32));
    }
}

/// Decode one packed big-endian signed sample (1, 2 or 3 bytes) to `[-1, 1)`.
fn pcm_be_to_f32(sample: &[u8]) -> f32 {
    match sample {
        &[a] => a as i8 as f32 / 128.0,
        &[a, b] => i16::from_be_bytes([a, b]) as f32 / 32_768.0,
        &[a, b, c] => (i32::from_be_bytes([a, b, c, 0]) >> 8) as f32 / 8_388_608.0,
        _ => 0.0,
    }
}
