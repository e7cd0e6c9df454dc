//! Packed big-endian PCM layout descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Bytes per sample of a packed big-endian PCM stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleWidth {
    Bits8,
    Bits16,
    Bits24,
}

impl SampleWidth {
    /// Map a byte count (1, 2 or 3) to a width.
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Bits8),
            2 => Some(Self::Bits16),
            3 => Some(Self::Bits24),
            _ => None,
        }
    }

    /// Smallest width that carries `bits` of resolution, capped at 24.
    pub fn for_bit_depth(bits: u32) -> Self {
        match bits {
            0..=8 => Self::Bits8,
            9..=16 => Self::Bits16,
            _ => Self::Bits24,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits24 => 3,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// Sample width and channel count of a stream.
///
/// A frame is one sample per channel, stored contiguously.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_width: SampleWidth,
    pub channels: u16,
}

impl PcmFormat {
    /// Build a format, rejecting zero channels.
    pub fn new(sample_width: SampleWidth, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(BridgeError::InvalidFormat {
                sample_width: sample_width.bytes() as u8,
                channels,
            });
        }
        Ok(Self {
            sample_width,
            channels,
        })
    }

    /// Build a format from a raw byte width as reported by a decoder.
    pub fn from_raw(sample_width: u8, channels: u16) -> Result<Self> {
        let width = SampleWidth::from_bytes(sample_width).ok_or(BridgeError::InvalidFormat {
            sample_width,
            channels,
        })?;
        Self::new(width, channels)
    }

    /// Bytes per frame (`sample_width * channels`).
    pub fn frame_bytes(&self) -> usize {
        self.sample_width.bytes() * self.channels as usize
    }

    /// Round `bytes` down to a whole number of frames.
    pub fn floor_to_frame(&self, bytes: usize) -> usize {
        bytes - bytes % self.frame_bytes()
    }

    pub fn is_frame_aligned(&self, bytes: usize) -> bool {
        bytes % self.frame_bytes() == 0
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.frame_bytes()
    }

    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames.saturating_mul(self.frame_bytes())
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit/{}ch", self.sample_width.bits(), self.channels)
    }
}
