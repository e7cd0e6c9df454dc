//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - choosing a stream config that carries the bridge's channel count as-is

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle`
/// (case-insensitive), or the host default when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let mut devices: Vec<cpal::Device> = host
        .output_devices()
        .context("No output devices")?
        .collect();

    if let Some(needle) = needle {
        if let Some(d) = devices.drain(..).find(|d| {
            d.description()
                .ok()
                .map(|n| matches_device_name(&n.name(), needle))
                .unwrap_or(false)
        }) {
            return Ok(d);
        }
        return Err(anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose an output config with exactly `channels` channels.
///
/// The bridge does no channel mapping, so configs with another channel count
/// are skipped. Among the rest, prefer a range containing `target_rate`, then
/// the closest rate below it, then the sample format rank.
pub fn pick_output_config(
    device: &cpal::Device,
    channels: u16,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()?
        .filter(|r| r.channels() == channels)
        .collect();
    if ranges.is_empty() {
        return Err(anyhow!("No output config with {channels} channels"));
    }

    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;

    for range in ranges {
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let exact = rate == target_rate;
        let format_rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_exact, b_rate, b_rank, _)) => is_better_candidate(
                (exact, rate, format_rank),
                (*b_exact, *b_rate, *b_rank),
                target_rate,
            ),
        };
        if replace {
            best = Some((exact, rate, format_rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|b| b.3)
        .ok_or_else(|| anyhow!("No usable output config"))
}

/// Fixed buffer size closest to `frames` that the device allows, or `None`
/// when the device does not report a range.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig, frames: u32) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(frames.clamp(*min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print available output devices to stdout.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn pick_rate_for_range(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::I32 => 0,
        cpal::SampleFormat::F32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

/// Compare `(exact, rate, rank)` candidates.
fn is_better_candidate(cand: (bool, u32, u8), best: (bool, u32, u8), target: u32) -> bool {
    let (exact, rate, rank) = cand;
    let (b_exact, b_rate, b_rank) = best;
    if exact != b_exact {
        return exact;
    }
    if rate != b_rate {
        return rate.abs_diff(target) < b_rate.abs_diff(target);
    }
    rank < b_rank
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
