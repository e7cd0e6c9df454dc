use std::path::PathBuf;
use std::time::Duration;

use pcm_bridge::BridgeConfig;
use pcm_bridge::copy::CopyMode;

use crate::cli::Args;

/// Everything `run_play` needs, resolved from the command line.
#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub path: PathBuf,
    pub device: Option<String>,
    pub bridge: BridgeConfig,
    pub message_frames: usize,
    pub stats_json: bool,
}

impl PlayConfig {
    pub fn from_args(args: &Args, path: PathBuf) -> Self {
        Self {
            path,
            device: normalize_device_name(args.device.clone()),
            bridge: bridge_config_from_args(args),
            message_frames: args.message_frames.max(1),
            stats_json: args.stats_json,
        }
    }
}

/// Bridge tuning from CLI flags; the sample rate is filled in once the
/// source is probed.
pub fn bridge_config_from_args(args: &Args) -> BridgeConfig {
    BridgeConfig {
        fill_timeout: Duration::from_millis(args.fill_timeout_ms),
        copy_mode: if args.per_sample_copy {
            CopyMode::PerSample
        } else {
            CopyMode::Auto
        },
        host_buffer_frames: args.buffer_frames,
        host_buffer_count: args.buffers,
        ..BridgeConfig::default()
    }
}

fn normalize_device_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
