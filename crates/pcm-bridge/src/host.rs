//! Host buffer pool and the per-callback driver loop.
//!
//! [`HostBufferCycle`] owns a ring of fixed-size [`HostBuffer`]s. Each hardware
//! request takes the next buffer, runs exactly one bridge fill into it and
//! hands the result to a [`HostSink`] (the platform output queue).

use std::time::Duration;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::format::PcmFormat;
use crate::staging::{FillOutcome, PcmConsumer, StagingBridge};

/// One reusable host buffer.
///
/// Capacity is fixed at construction and is always a whole number of frames.
/// `len()` is the number of bytes the last fill wrote.
pub struct HostBuffer {
    data: Vec<u8>,
    len: usize,
    format: PcmFormat,
}

impl HostBuffer {
    /// Allocate a zeroed buffer holding `frames` frames of `format`.
    pub fn new(format: PcmFormat, frames: usize) -> Self {
        Self {
            data: vec![0; format.frames_to_bytes(frames)],
            len: 0,
            format,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Frames written by the last fill.
    pub fn frames(&self) -> usize {
        self.format.bytes_to_frames(self.len)
    }

    /// Bytes written by the last fill.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn spare_mut(&mut self, from: usize) -> &mut [u8] {
        &mut self.data[from..]
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len;
    }
}

/// Platform output queue that accepts filled host buffers.
pub trait HostSink {
    /// Take a buffer after its fill. `buffer.len()` bytes are valid; the
    /// rest of the period is silence.
    fn submit(&mut self, buffer: &HostBuffer, outcome: FillOutcome);
}

/// Real-time driver that feeds the platform from the staging bridge.
///
/// Must be driven from a single platform audio thread.
pub struct HostBufferCycle {
    consumer: PcmConsumer,
    pool: Vec<HostBuffer>,
    next: usize,
    frames_per_buffer: usize,
}

impl HostBufferCycle {
    /// Build the buffer pool for the bridge's current format.
    pub fn new(consumer: PcmConsumer, config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let format = consumer.bridge().format();
        let pool = (0..config.host_buffer_count)
            .map(|_| HostBuffer::new(format, config.host_buffer_frames))
            .collect();
        Ok(Self {
            consumer,
            pool,
            next: 0,
            frames_per_buffer: config.host_buffer_frames,
        })
    }

    pub fn bridge(&self) -> &std::sync::Arc<StagingBridge> {
        self.consumer.bridge()
    }

    pub fn format(&self) -> PcmFormat {
        self.pool[0].format()
    }

    pub fn frames_per_buffer(&self) -> usize {
        self.frames_per_buffer
    }

    pub fn buffer_count(&self) -> usize {
        self.pool.len()
    }

    /// Fill every pool buffer once and submit them, before the platform
    /// starts pulling. Returns the outcome of each fill.
    pub fn prime<S: HostSink>(&mut self, sink: &mut S) -> Vec<FillOutcome> {
        let outcomes: Vec<FillOutcome> = (0..self.pool.len()).map(|_| self.service(sink)).collect();
        let bytes: usize = outcomes.iter().map(FillOutcome::bytes_written).sum();
        tracing::info!(
            buffers = outcomes.len(),
            bytes,
            underruns = outcomes.iter().filter(|o| o.is_underrun()).count(),
            "host buffers primed"
        );
        outcomes
    }

    /// Serve one hardware request: fill the next buffer and submit it.
    pub fn service<S: HostSink>(&mut self, sink: &mut S) -> FillOutcome {
        self.service_within(sink, Duration::MAX)
    }

    /// [`service`](Self::service) with the fill wait capped at `budget`.
    pub fn service_within<S: HostSink>(&mut self, sink: &mut S, budget: Duration) -> FillOutcome {
        let idx = self.next;
        self.next = (self.next + 1) % self.pool.len();
        let buffer = &mut self.pool[idx];
        let outcome = self.consumer.fill_host_buffer_within(buffer, budget);
        sink.submit(buffer, outcome);
        outcome
    }

    /// Switch to a new stream format and rebuild the pool.
    ///
    /// Fails without touching the pool if the bridge still holds audio.
    pub fn reconfigure(&mut self, format: PcmFormat) -> Result<()> {
        self.consumer.bridge().set_format(format)?;
        if format != self.format() {
            for buffer in &mut self.pool {
                *buffer = HostBuffer::new(format, self.frames_per_buffer);
            }
            tracing::info!(
                %format,
                buffer_bytes = format.frames_to_bytes(self.frames_per_buffer),
                "host buffers reconfigured"
            );
        }
        self.next = 0;
        Ok(())
    }
}
