//! Player runtime: wires the decode thread, the staging bridge and the CPAL
//! output together and waits for playback to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;
use crossbeam_channel::RecvTimeoutError;
use pcm_bridge::output::{self, OutputOptions};
use pcm_bridge::status::BridgeStats;
use pcm_bridge::config::frames_duration;
use pcm_bridge::{BridgeConfig, HostBufferCycle, device, staging_channel};

use crate::config::PlayConfig;
use crate::decode::{self, DecodeEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Extra drain time on top of the queued audio after a finished decode.
const DRAIN_SLACK: Duration = Duration::from_secs(1);
/// Drain time after Ctrl-C or a decode failure.
const CANCEL_GRACE: Duration = Duration::from_millis(500);

/// List output devices and print them to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    device::list_devices(&host)
}

/// Play one file through the bridge and return the final bridge statistics.
pub fn run_play(config: PlayConfig) -> Result<BridgeStats> {
    let source = decode::probe_file(&config.path)?;
    let info = source.info.clone();
    tracing::info!(
        path = ?config.path,
        format = %info.format,
        rate_hz = info.sample_rate,
        codec = info.codec.as_deref().unwrap_or("unknown"),
        duration_ms = ?info.duration_ms,
        "source"
    );

    let bridge_cfg = BridgeConfig {
        sample_rate: info.sample_rate,
        ..config.bridge.clone()
    };

    let host = cpal::default_host();
    let device = device::pick_device(&host, config.device.as_deref())?;
    tracing::info!(device = %device.description()?, "output device");
    let supported = device::pick_output_config(&device, info.format.channels, info.sample_rate)?;
    let mut stream_config: cpal::StreamConfig = supported.clone().into();
    if stream_config.sample_rate != info.sample_rate {
        return Err(anyhow!(
            "device cannot run at {} Hz (closest {} Hz); resampling is not supported",
            info.sample_rate,
            stream_config.sample_rate
        ));
    }
    if let Some(buf) = device::pick_buffer_size(&supported, bridge_cfg.host_buffer_frames as u32) {
        stream_config.buffer_size = buf;
    }
    tracing::info!(
        sample_format = ?supported.sample_format(),
        buffer_size = ?stream_config.buffer_size,
        host_buffer_frames = bridge_cfg.host_buffer_frames,
        host_buffers = bridge_cfg.host_buffer_count,
        fill_timeout_ms = bridge_cfg.fill_timeout.as_millis() as u64,
        "device output config"
    );

    let (producer, consumer) = staging_channel(info.format, &bridge_cfg)?;
    let bridge = producer.bridge().clone();
    let cycle = HostBufferCycle::new(consumer, &bridge_cfg)?;

    {
        let bridge = bridge.clone();
        let _ = ctrlc::set_handler(move || {
            tracing::info!("interrupted; closing bridge");
            bridge.close();
        });
    }

    let (events_tx, events_rx) = crossbeam_channel::bounded(1);
    let decoder = decode::spawn_decoder(source, producer, config.message_frames, events_tx);

    let played_frames = Arc::new(AtomicU64::new(0));
    let out = output::build_output_stream(
        &device,
        &stream_config,
        supported.sample_format(),
        cycle,
        OutputOptions {
            paused: None,
            played_frames: Some(played_frames.clone()),
        },
    )?;
    out.play()?;

    let mut failure: Option<String> = None;
    let mut stream_failed = false;
    let mut drain_deadline: Option<Instant> = None;
    while !out.is_finished() {
        if out.has_failed() {
            // Unblock the decoder; nothing will drain the bridge any more.
            bridge.close();
            stream_failed = true;
            break;
        }
        if let Some(deadline) = drain_deadline {
            if Instant::now() >= deadline {
                tracing::warn!(
                    pending_bytes = bridge.pending_bytes(),
                    "output did not drain in time; stopping"
                );
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }
        match events_rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                let grace = match event {
                    DecodeEvent::Finished { messages, frames } => {
                        tracing::info!(messages, frames, "decoder done; draining");
                        drain_grace(&bridge_cfg, config.message_frames)
                    }
                    DecodeEvent::Cancelled => {
                        tracing::info!("playback cancelled");
                        CANCEL_GRACE
                    }
                    DecodeEvent::Failed(e) => {
                        failure = Some(e);
                        CANCEL_GRACE
                    }
                };
                // Queued audio still drains after close.
                bridge.close();
                drain_deadline = Some(Instant::now() + grace);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                bridge.close();
                drain_deadline = Some(Instant::now() + CANCEL_GRACE);
            }
        }
    }

    out.pause()?;
    let _ = decoder.join();

    let stats = bridge.stats();
    tracing::info!(
        played_frames = played_frames.load(Ordering::Relaxed),
        fills = stats.fills,
        splits = stats.splits,
        underruns = stats.underrun_events,
        "playback finished"
    );

    if stream_failed {
        return Err(anyhow!("output stream stopped: device lost or invalidated"));
    }
    match failure {
        Some(e) => Err(anyhow!("decode failed: {e}")),
        None => Ok(stats),
    }
}

/// How long to wait for the output to play out after a finished decode: the
/// last message plus the whole host buffer pool, with slack for device
/// latency.
fn drain_grace(cfg: &BridgeConfig, message_frames: usize) -> Duration {
    let frames = message_frames + cfg.host_buffer_frames * cfg.host_buffer_count;
    frames_duration(frames, cfg.sample_rate) + DRAIN_SLACK
}
