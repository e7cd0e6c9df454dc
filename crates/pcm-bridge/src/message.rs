//! Immutable, splittable PCM messages.
//!
//! A [`PlayableAudioMessage`] is a window onto a shared, reference-counted
//! payload. Splitting never copies audio: both halves keep the same `Arc` and
//! narrow their byte range, so a message handed over by the producer can be
//! drained across several host buffers without reallocating.

use std::fmt;
use std::sync::Arc;

use crate::copy::SampleCopyStrategy;
use crate::error::{AlignmentError, BridgeError, Result};
use crate::format::PcmFormat;

/// Packed big-endian PCM tagged with its sample width and channel count.
///
/// Invariant: `len()` is always a whole number of frames.
#[derive(Clone)]
pub struct PlayableAudioMessage {
    format: PcmFormat,
    payload: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl PlayableAudioMessage {
    /// Wrap `bytes` as a message; fails if it holds a partial frame.
    pub fn new(format: PcmFormat, bytes: Vec<u8>) -> Result<Self> {
        Self::from_shared(format, Arc::from(bytes))
    }

    /// Wrap an already shared payload.
    pub fn from_shared(format: PcmFormat, payload: Arc<[u8]>) -> Result<Self> {
        if !format.is_frame_aligned(payload.len()) {
            return Err(BridgeError::PartialFrame {
                len: payload.len(),
                frame_bytes: format.frame_bytes(),
            });
        }
        let end = payload.len();
        Ok(Self {
            format,
            payload,
            start: 0,
            end,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Remaining byte length.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn frames(&self) -> usize {
        self.format.bytes_to_frames(self.len())
    }

    /// Bytes covered by this message.
    pub fn bytes(&self) -> &[u8] {
        &self.payload[self.start..self.end]
    }

    /// Split into `(head, tail)` at `offset` bytes.
    ///
    /// `offset` must be frame aligned and no larger than `len()`. Either half
    /// may be empty when `offset` is `0` or `len()`.
    pub fn split(self, offset: usize) -> std::result::Result<(Self, Self), AlignmentError> {
        if offset > self.len() || !self.format.is_frame_aligned(offset) {
            return Err(AlignmentError {
                offset,
                len: self.len(),
                frame_bytes: self.format.frame_bytes(),
            });
        }
        let mid = self.start + offset;
        let tail = Self {
            format: self.format,
            payload: self.payload.clone(),
            start: mid,
            end: self.end,
        };
        let head = Self { end: mid, ..self };
        Ok((head, tail))
    }

    /// Copy up to `max_bytes` (rounded down to whole frames) into `dst`.
    ///
    /// Returns the number of bytes written. The message itself is unchanged;
    /// callers split off what they consumed.
    pub fn copy_into(&self, dst: &mut [u8], max_bytes: usize, strategy: SampleCopyStrategy) -> usize {
        let want = self.format.floor_to_frame(self.len().min(max_bytes).min(dst.len()));
        strategy.copy(self.format, &self.bytes()[..want], &mut dst[..want])
    }
}

impl fmt::Debug for PlayableAudioMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableAudioMessage")
            .field("format", &self.format)
            .field("len", &self.len())
            .field("offset", &self.start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleWidth;

    fn stereo16() -> PcmFormat {
        PcmFormat::new(SampleWidth::Bits16, 2).unwrap()
    }

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn new_rejects_partial_frames() {
        let err = PlayableAudioMessage::new(stereo16(), vec![0; 41]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::PartialFrame {
                len: 41,
                frame_bytes: 4
            }
        ));
    }

    #[test]
    fn split_rejects_misaligned_offset() {
        let msg = PlayableAudioMessage::new(stereo16(), ramp(40)).unwrap();
        let err = msg.split(15).unwrap_err();
        assert_eq!(
            err,
            AlignmentError {
                offset: 15,
                len: 40,
                frame_bytes: 4
            }
        );
    }

    #[test]
    fn split_rejects_offset_past_end() {
        let msg = PlayableAudioMessage::new(stereo16(), ramp(40)).unwrap();
        assert!(msg.split(44).is_err());
    }

    #[test]
    fn split_partitions_every_aligned_offset() {
        for (width, channels) in [
            (SampleWidth::Bits8, 1),
            (SampleWidth::Bits16, 2),
            (SampleWidth::Bits24, 2),
            (SampleWidth::Bits24, 3),
        ] {
            let format = PcmFormat::new(width, channels).unwrap();
            let original = ramp(format.frame_bytes() * 9);
            let frame = format.frame_bytes();
            for offset in (frame..original.len()).step_by(frame) {
                let msg = PlayableAudioMessage::new(format, original.clone()).unwrap();
                let (head, tail) = msg.split(offset).unwrap();
                assert_eq!(head.len(), offset);
                assert_eq!(head.len() + tail.len(), original.len());
                let mut joined = head.bytes().to_vec();
                joined.extend_from_slice(tail.bytes());
                assert_eq!(joined, original);
            }
        }
    }

    #[test]
    fn nested_splits_keep_absolute_positions() {
        let msg = PlayableAudioMessage::new(stereo16(), ramp(40)).unwrap();
        let (_, tail) = msg.split(8).unwrap();
        let (mid, rest) = tail.split(12).unwrap();
        assert_eq!(mid.bytes(), &ramp(40)[8..20]);
        assert_eq!(rest.bytes(), &ramp(40)[20..40]);
        assert_eq!(rest.frames(), 5);
    }

    #[test]
    fn copy_into_rounds_down_to_whole_frames() {
        let msg = PlayableAudioMessage::new(stereo16(), ramp(40)).unwrap();
        let mut dst = [0u8; 64];
        let n = msg.copy_into(&mut dst, 23, SampleCopyStrategy::Bulk);
        assert_eq!(n, 20);
        assert_eq!(&dst[..20], &ramp(40)[..20]);
        assert!(dst[20..].iter().all(|b| *b == 0));
        assert_eq!(msg.len(), 40);
    }

    #[test]
    fn copy_into_is_limited_by_message_length() {
        let msg = PlayableAudioMessage::new(stereo16(), ramp(16)).unwrap();
        let mut dst = [0u8; 24];
        assert_eq!(msg.copy_into(&mut dst, 24, SampleCopyStrategy::PerSample), 16);
    }
}
