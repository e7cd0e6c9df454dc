//! PCM staging bridge.
//!
//! Connects a push-based render pipeline, which produces variable-length
//! big-endian PCM messages, to a pull-based real-time audio callback that asks
//! for fixed-size host buffers.
//!
//! ## Pieces
//! - [`message::PlayableAudioMessage`]: immutable, frame-aligned, zero-copy splittable PCM.
//! - [`copy::SampleCopyStrategy`]: bulk or per-sample copy into a host buffer.
//! - [`staging`]: the depth-one handoff (`PcmProducer` / `PcmConsumer`).
//! - [`host::HostBufferCycle`]: buffer pool + one fill per hardware request.
//! - [`output`]: CPAL stream running a cycle on the device callback.

pub mod config;
pub mod copy;
pub mod device;
pub mod error;
pub mod format;
pub mod host;
pub mod message;
pub mod output;
pub mod staging;
pub mod status;

pub use config::BridgeConfig;
pub use error::{AlignmentError, BridgeError};
pub use format::{PcmFormat, SampleWidth};
pub use host::{HostBuffer, HostBufferCycle, HostSink};
pub use message::PlayableAudioMessage;
pub use staging::{FillOutcome, PcmConsumer, PcmProducer, StagingBridge, staging_channel};
