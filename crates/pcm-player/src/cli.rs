use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pcm-player", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Frames per host buffer (also requested as the device buffer size)
    #[arg(long, default_value_t = 1024)]
    pub buffer_frames: usize,

    /// Number of host buffers in the pool
    #[arg(long, default_value_t = 5)]
    pub buffers: usize,

    /// Longest a device callback waits for the decoder before reporting an underrun
    #[arg(long, default_value_t = 20)]
    pub fill_timeout_ms: u64,

    /// Copy one sample at a time instead of bulk fragment copies
    #[arg(long)]
    pub per_sample_copy: bool,

    /// Frames per decoded message handed to the bridge
    #[arg(long, default_value_t = 4096)]
    pub message_frames: usize,

    /// Print bridge statistics as JSON when playback ends
    #[arg(long)]
    pub stats_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a local file through the staging bridge
    Play {
        /// Path to audio file (FLAC/WAV recommended)
        path: PathBuf,
    },
}
