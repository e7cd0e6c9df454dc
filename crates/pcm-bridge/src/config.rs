use std::time::Duration;

use crate::copy::CopyMode;
use crate::error::{BridgeError, Result};

/// Upper bound on how long a fill may block.
const MAX_FILL_TIMEOUT: Duration = Duration::from_secs(1);

/// Tuning parameters shared by the staging bridge and the host buffer cycle.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Longest a fill may wait for the producer before reporting an underrun.
    pub fill_timeout: Duration,
    /// How fills copy message bytes into host buffers.
    pub copy_mode: CopyMode,
    /// Frames per host buffer.
    pub host_buffer_frames: usize,
    /// Number of host buffers in the pool.
    pub host_buffer_count: usize,
    /// Output sample rate in Hz, used for buffer-duration budgeting.
    pub sample_rate: u32,
}

impl Default for BridgeConfig {
    /// Five buffers of 1024 frames, matching a typical host audio queue.
    fn default() -> Self {
        Self {
            fill_timeout: Duration::from_millis(20),
            copy_mode: CopyMode::Auto,
            host_buffer_frames: 1024,
            host_buffer_count: 5,
            sample_rate: 44_100,
        }
    }
}

impl BridgeConfig {
    /// Reject values the bridge cannot run with.
    ///
    /// A fill timeout longer than one host buffer period is accepted but
    /// logged: a stalled producer will then hold the callback past its deadline.
    pub fn validate(&self) -> Result<()> {
        if self.host_buffer_frames == 0 {
            return Err(BridgeError::InvalidConfig(
                "host_buffer_frames must be > 0".to_string(),
            ));
        }
        if self.host_buffer_count == 0 {
            return Err(BridgeError::InvalidConfig(
                "host_buffer_count must be > 0".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(BridgeError::InvalidConfig("sample_rate must be > 0".to_string()));
        }
        if self.fill_timeout.is_zero() || self.fill_timeout > MAX_FILL_TIMEOUT {
            return Err(BridgeError::InvalidConfig(format!(
                "fill_timeout {:?} must be within (0, {:?}]",
                self.fill_timeout, MAX_FILL_TIMEOUT
            )));
        }
        if self.exceeds_buffer_budget() {
            tracing::warn!(
                fill_timeout_ms = self.fill_timeout.as_millis() as u64,
                buffer_ms = self.buffer_duration().as_millis() as u64,
                "fill timeout longer than one host buffer"
            );
        }
        Ok(())
    }

    /// Whether a full fill timeout would overrun one host buffer period.
    pub fn exceeds_buffer_budget(&self) -> bool {
        self.fill_timeout > self.buffer_duration()
    }

    /// Playback time covered by one host buffer.
    pub fn buffer_duration(&self) -> Duration {
        frames_duration(self.host_buffer_frames, self.sample_rate)
    }
}

/// Playback time of `frames` frames at `sample_rate`; zero for a zero rate.
pub fn frames_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = (frames as u128 * 1_000_000_000) / sample_rate as u128;
    Duration::from_nanos(nanos as u64)
}
