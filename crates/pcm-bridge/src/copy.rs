//! Format-aware copy of packed PCM from a message into a host buffer.
//!
//! Two paths produce identical bytes:
//! - [`SampleCopyStrategy::Bulk`]: one `copy_from_slice` over the whole run
//! - [`SampleCopyStrategy::PerSample`]: walks frame by frame, sample by sample
//!
//! The per-sample path is the seam for sources that cannot hand over a packed
//! run; nothing is converted on either path.

use serde::{Deserialize, Serialize};

use crate::format::PcmFormat;

/// Caller preference for how fills copy data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Bulk copy whenever source and destination layouts match.
    #[default]
    Auto,
    /// Always take the per-sample path.
    PerSample,
}

/// Copy path chosen once per buffer fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleCopyStrategy {
    Bulk,
    PerSample,
}

impl SampleCopyStrategy {
    /// Pick the copy path for a `src` payload landing in a `dst` layout.
    pub fn select(mode: CopyMode, src: PcmFormat, dst: PcmFormat) -> Self {
        match mode {
            CopyMode::Auto if src == dst => Self::Bulk,
            _ => Self::PerSample,
        }
    }

    /// Copy whole frames of `src` into the front of `dst`.
    ///
    /// Copies `min(src.len(), dst.len())` rounded down to `format`'s frame size
    /// and returns the number of bytes written.
    pub fn copy(self, format: PcmFormat, src: &[u8], dst: &mut [u8]) -> usize {
        let n = format.floor_to_frame(src.len().min(dst.len()));
        if n == 0 {
            return 0;
        }
        match self {
            Self::Bulk => dst[..n].copy_from_slice(&src[..n]),
            Self::PerSample => {
                let frame = format.frame_bytes();
                for (s, d) in src[..n]
                    .chunks_exact(frame)
                    .zip(dst[..n].chunks_exact_mut(frame))
                {
                    copy_frame(format, s, d);
                }
            }
        }
        n
    }
}

/// Copy one frame sample by sample.
fn copy_frame(format: PcmFormat, src: &[u8], dst: &mut [u8]) {
    let width = format.sample_width.bytes();
    for (s, d) in src.chunks_exact(width).zip(dst.chunks_exact_mut(width)) {
        // Big-endian in, big-endian out.
        d.copy_from_slice(s);
    }
}
