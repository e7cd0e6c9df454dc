//! pcm-player: decodes a local file and plays it through the PCM staging
//! bridge.
//!
//! ## Pipeline
//! 1. **Decode**: a background thread uses Symphonia to turn the input into
//!    big-endian PCM messages and blocks in `enqueue` until the bridge is ready.
//! 2. **Stage**: the bridge holds at most one message and splits it across
//!    host buffers.
//! 3. **Playback**: the CPAL callback runs one bridge fill per host buffer and
//!    converts to the device sample format.

use anyhow::{Result, anyhow};
use clap::Parser;
use pcm_player::cli::{Args, Command};
use pcm_player::config::PlayConfig;
use pcm_player::runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,pcm_bridge=info,pcm_player=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    match &args.cmd {
        Some(Command::Play { path }) => {
            let config = PlayConfig::from_args(&args, path.clone());
            let stats_json = config.stats_json;
            let stats = runtime::run_play(config)?;
            if stats_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Ok(())
        }
        None => Err(anyhow!("no command given; try `pcm-player play <path>`")),
    }
}
