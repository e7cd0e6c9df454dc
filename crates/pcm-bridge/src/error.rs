//! Error types for the staging bridge.
//!
//! Underruns are not errors: they are reported through
//! [`FillOutcome::Underrun`](crate::staging::FillOutcome) so the real-time
//! callback never has to unwind.

use crate::format::PcmFormat;
use crate::message::PlayableAudioMessage;

/// A split offset that would cut through a sample frame or run past the end
/// of the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("split offset {offset} invalid for {len}-byte message with {frame_bytes}-byte frames")]
pub struct AlignmentError {
    /// Requested split offset in bytes.
    pub offset: usize,
    /// Remaining length of the message being split.
    pub len: usize,
    /// Frame size of the message.
    pub frame_bytes: usize,
}

/// Errors returned by bridge construction, control and producer calls.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Sample width outside 1..=3 bytes or zero channels.
    #[error("invalid pcm format: {sample_width} byte samples, {channels} channels")]
    InvalidFormat { sample_width: u8, channels: u16 },

    /// Payload length is not a whole number of frames.
    #[error("payload of {len} bytes is not a multiple of the {frame_bytes}-byte frame")]
    PartialFrame { len: usize, frame_bytes: usize },

    /// `set_format` was called while a message (or split remainder) is queued.
    #[error("cannot change format to {requested} while {pending_bytes} bytes are queued")]
    FormatChangePending {
        requested: PcmFormat,
        pending_bytes: usize,
    },

    /// The producer offered a message in a format the bridge is not set up for.
    ///
    /// The message is handed back so the caller can reconfigure and retry.
    #[error("message format {got} does not match bridge format {expected}")]
    FormatMismatch {
        expected: PcmFormat,
        got: PcmFormat,
        message: PlayableAudioMessage,
    },

    /// The bridge was closed; no further messages are accepted.
    #[error("staging bridge closed")]
    Closed,

    /// Rejected configuration value.
    #[error("invalid bridge config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
