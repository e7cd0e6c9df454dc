//! Depth-one handoff between the render thread and the real-time host callback.
//!
//! The producer pushes whole messages; the consumer pulls exactly one host
//! buffer's worth per callback. In between sits a single slot:
//!
//! - [`PcmProducer::enqueue`] blocks until the consumer raises the readiness
//!   signal, then drops its message into the slot.
//! - [`PcmConsumer::fill_host_buffer`] raises readiness whenever it finds the
//!   slot empty, waits a bounded time for a message, copies as much as fits
//!   and puts any tail back into the slot.
//!
//! Readiness is only raised from an empty slot, so a split tail always drains
//! before the producer may hand over the next message. At most one message is
//! ever held by the bridge.
//!
//! Slot, readiness flag and format share one mutex and one [`Condvar`] used as
//! a general "state changed" signal. The buffer cursor has its own lock,
//! taken only around the copy.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::copy::{CopyMode, SampleCopyStrategy};
use crate::error::{BridgeError, Result};
use crate::format::PcmFormat;
use crate::host::HostBuffer;
use crate::message::PlayableAudioMessage;
use crate::status::{BridgeCounters, BridgeStats};

/// Write position inside the host buffer currently being filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferCursor {
    /// Next byte to write.
    pub write_offset: usize,
    /// Bytes left before the buffer is full.
    pub remaining: usize,
}

/// Result of one fill cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillOutcome {
    /// The message was drained completely.
    Drained { bytes: usize },
    /// The buffer filled up; `remaining` bytes were put back for the next cycle.
    Partial { bytes: usize, remaining: usize },
    /// No message arrived within the fill timeout.
    Underrun,
    /// The bridge is closed and holds nothing more to play.
    Closed,
}

impl FillOutcome {
    /// Bytes written into the host buffer this cycle.
    pub fn bytes_written(&self) -> usize {
        match *self {
            Self::Drained { bytes } | Self::Partial { bytes, .. } => bytes,
            Self::Underrun | Self::Closed => 0,
        }
    }

    pub fn is_underrun(&self) -> bool {
        matches!(self, Self::Underrun)
    }
}

/// Shared state of the bridge. Owned jointly by the producer and consumer
/// handles; control calls (`set_format`, `close`, stats) go through here.
pub struct StagingBridge {
    handoff: Mutex<Handoff>,
    cv: Condvar,
    cursor: Mutex<BufferCursor>,
    counters: BridgeCounters,
}

struct Handoff {
    /// The single queue slot: a fresh message or a split remainder.
    slot: Option<PlayableAudioMessage>,
    /// Set while the consumer holds a message outside the slot.
    in_flight: bool,
    /// Binary readiness semaphore for the producer.
    host_ready: bool,
    format: PcmFormat,
    closed: bool,
}

/// Create a bridge for `format` and return its two endpoints.
///
/// Neither endpoint is `Clone`, and both operations take `&mut self`: exactly
/// one producer thread and one consumer thread can use the bridge.
pub fn staging_channel(format: PcmFormat, config: &BridgeConfig) -> Result<(PcmProducer, PcmConsumer)> {
    config.validate()?;
    let bridge = Arc::new(StagingBridge {
        handoff: Mutex::new(Handoff {
            slot: None,
            in_flight: false,
            host_ready: false,
            format,
            closed: false,
        }),
        cv: Condvar::new(),
        cursor: Mutex::new(BufferCursor::default()),
        counters: BridgeCounters::default(),
    });
    let producer = PcmProducer {
        bridge: bridge.clone(),
    };
    let consumer = PcmConsumer {
        bridge,
        fill_timeout: config.fill_timeout,
        copy_mode: config.copy_mode,
    };
    Ok((producer, consumer))
}

impl StagingBridge {
    /// Format currently expected from the producer and used for host buffers.
    pub fn format(&self) -> PcmFormat {
        self.handoff.lock().unwrap().format
    }

    /// Switch the stream format between streams.
    ///
    /// Only legal when nothing is queued or being drained; otherwise returns
    /// [`BridgeError::FormatChangePending`] and the caller must drain first.
    pub fn set_format(&self, format: PcmFormat) -> Result<()> {
        let mut g = self.handoff.lock().unwrap();
        if g.slot.is_some() || g.in_flight {
            let pending_bytes = g.slot.as_ref().map(|m| m.len()).unwrap_or(0);
            return Err(BridgeError::FormatChangePending {
                requested: format,
                pending_bytes,
            });
        }
        if g.format != format {
            tracing::info!(from = %g.format, to = %format, "staging format changed");
            g.format = format;
        }
        Ok(())
    }

    /// Reset the buffer cursor for a freshly armed host buffer.
    pub fn arm_buffer(&self, capacity: usize) {
        let mut c = self.cursor.lock().unwrap();
        *c = BufferCursor {
            write_offset: 0,
            remaining: capacity,
        };
    }

    /// Current cursor position (best-effort snapshot).
    pub fn cursor(&self) -> BufferCursor {
        *self.cursor.lock().unwrap()
    }

    /// Bytes waiting in the slot.
    pub fn pending_bytes(&self) -> usize {
        let g = self.handoff.lock().unwrap();
        g.slot.as_ref().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the readiness signal is currently raised and not yet consumed.
    pub fn is_host_ready(&self) -> bool {
        self.handoff.lock().unwrap().host_ready
    }

    /// Stop the bridge and wake both sides.
    ///
    /// A blocked producer returns [`BridgeError::Closed`]. The consumer keeps
    /// draining whatever is still queued, then reports [`FillOutcome::Closed`].
    /// Idempotent.
    pub fn close(&self) {
        let mut g = self.handoff.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.handoff.lock().unwrap().closed
    }

    /// Block until the last enqueued message has been fully drained, or
    /// `timeout` elapses. Returns `true` when drained.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let g = self.handoff.lock().unwrap();
        let (g, _timeout) = self
            .cv
            .wait_timeout_while(g, timeout, |h| h.slot.is_some() || h.in_flight)
            .unwrap();
        g.slot.is_none() && !g.in_flight
    }

    pub fn counters(&self) -> &BridgeCounters {
        &self.counters
    }

    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }
}

/// Render-side endpoint.
pub struct PcmProducer {
    bridge: Arc<StagingBridge>,
}

impl PcmProducer {
    /// Hand a message to the bridge, blocking until the consumer has drained
    /// the previous one.
    ///
    /// Empty messages are accepted and dropped without waiting.
    pub fn enqueue(&mut self, message: PlayableAudioMessage) -> Result<()> {
        if message.is_empty() {
            tracing::trace!("dropping empty message");
            return Ok(());
        }

        let bridge = &self.bridge;
        let mut g = bridge.handoff.lock().unwrap();
        tracing::trace!(bytes = message.len(), "waiting to enqueue");
        while !g.host_ready && !g.closed {
            g = bridge.cv.wait(g).unwrap();
        }
        if g.closed {
            return Err(BridgeError::Closed);
        }
        if message.format() != g.format {
            return Err(BridgeError::FormatMismatch {
                expected: g.format,
                got: message.format(),
                message,
            });
        }

        g.host_ready = false;
        debug_assert!(g.slot.is_none() && !g.in_flight);
        let bytes = message.len();
        g.slot = Some(message);
        drop(g);
        bridge.cv.notify_all();

        BridgeCounters::bump(&bridge.counters.messages_enqueued, 1);
        tracing::trace!(bytes, "enqueued");
        Ok(())
    }

    pub fn bridge(&self) -> &Arc<StagingBridge> {
        &self.bridge
    }
}

/// Host-side endpoint, driven from the real-time callback thread.
pub struct PcmConsumer {
    bridge: Arc<StagingBridge>,
    fill_timeout: Duration,
    copy_mode: CopyMode,
}

impl PcmConsumer {
    /// Fill `buffer` from the queued message and report what was written.
    ///
    /// Never blocks longer than the configured fill timeout. On underrun or
    /// close the buffer is left empty.
    pub fn fill_host_buffer(&mut self, buffer: &mut HostBuffer) -> FillOutcome {
        self.fill_host_buffer_within(buffer, self.fill_timeout)
    }

    /// Like [`fill_host_buffer`](Self::fill_host_buffer), but waits at most
    /// `min(fill_timeout, budget)` for a message.
    ///
    /// The callback passes what is left of its own deadline so several fills
    /// in one render pass cannot add up past it.
    pub fn fill_host_buffer_within(&mut self, buffer: &mut HostBuffer, budget: Duration) -> FillOutcome {
        let bridge = &self.bridge;
        let wait = self.fill_timeout.min(budget);
        BridgeCounters::bump(&bridge.counters.fills, 1);
        buffer.clear();
        bridge.arm_buffer(buffer.capacity());

        let (message, host_format) = {
            let mut g = bridge.handoff.lock().unwrap();
            debug_assert!(
                g.format.is_frame_aligned(buffer.capacity()),
                "host buffer of {} bytes is not whole {} frames",
                buffer.capacity(),
                g.format
            );

            if g.slot.is_none() && !g.host_ready {
                tracing::trace!("slot empty; signalling host ready");
                g.host_ready = true;
                BridgeCounters::bump(&bridge.counters.ready_signals, 1);
                bridge.cv.notify_all();
            }

            let (mut g, _timeout) = bridge
                .cv
                .wait_timeout_while(g, wait, |h| h.slot.is_none() && !h.closed)
                .unwrap();

            match g.slot.take() {
                Some(m) => {
                    g.in_flight = true;
                    (m, g.format)
                }
                None if g.closed => return FillOutcome::Closed,
                None => {
                    drop(g);
                    self.report_underrun(buffer.capacity(), wait);
                    return FillOutcome::Underrun;
                }
            }
        };

        let strategy = SampleCopyStrategy::select(self.copy_mode, message.format(), host_format);
        let written = {
            let mut cursor = bridge.cursor.lock().unwrap();
            let dst = buffer.spare_mut(cursor.write_offset);
            let n = message.copy_into(dst, cursor.remaining, strategy);
            cursor.write_offset += n;
            cursor.remaining -= n;
            n
        };
        buffer.set_len(written);
        BridgeCounters::bump(&bridge.counters.bytes_written, written as u64);

        let remaining = message.len() - written;
        let (outcome, tail) = if remaining == 0 {
            BridgeCounters::bump(&bridge.counters.messages_drained, 1);
            tracing::trace!(bytes = written, "message drained");
            (FillOutcome::Drained { bytes: written }, None)
        } else {
            let tail = if written == 0 {
                message
            } else {
                let (_head, tail) = message
                    .split(written)
                    .unwrap_or_else(|e| panic!("staging split invariant violated: {e}"));
                BridgeCounters::bump(&bridge.counters.splits, 1);
                tail
            };
            tracing::trace!(bytes = written, remaining, "requeue remainder");
            let outcome = FillOutcome::Partial {
                bytes: written,
                remaining,
            };
            (outcome, Some(tail))
        };

        // Requeue and release in one critical section.
        let mut g = bridge.handoff.lock().unwrap();
        if let Some(tail) = tail {
            debug_assert!(g.slot.is_none());
            g.slot = Some(tail);
        }
        g.in_flight = false;
        drop(g);
        bridge.cv.notify_all();

        outcome
    }

    fn report_underrun(&self, capacity: usize, waited: Duration) {
        let counters = &self.bridge.counters;
        BridgeCounters::bump(&counters.underrun_events, 1);
        BridgeCounters::bump(&counters.silent_bytes, capacity as u64);
        if counters.should_log_underrun() {
            tracing::warn!(
                waited_ms = waited.as_millis() as u64,
                underruns = counters.underrun_events.load(std::sync::atomic::Ordering::Relaxed),
                "staging underrun: no message within fill timeout"
            );
        }
    }

    pub fn bridge(&self) -> &Arc<StagingBridge> {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SampleWidth;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn stereo16() -> PcmFormat {
        PcmFormat::new(SampleWidth::Bits16, 2).unwrap()
    }

    fn config(timeout_ms: u64) -> BridgeConfig {
        BridgeConfig {
            fill_timeout: Duration::from_millis(timeout_ms),
            ..BridgeConfig::default()
        }
    }

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    fn msg(bytes: Vec<u8>) -> PlayableAudioMessage {
        PlayableAudioMessage::new(stereo16(), bytes).unwrap()
    }

    /// Spawn a producer that enqueues `messages` and reports each completed
    /// enqueue index over the returned channel.
    fn spawn_producer(
        mut producer: PcmProducer,
        messages: Vec<PlayableAudioMessage>,
    ) -> (mpsc::Receiver<usize>, thread::JoinHandle<PcmProducer>) {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            for (i, m) in messages.into_iter().enumerate() {
                producer.enqueue(m).unwrap();
                let _ = tx.send(i);
            }
            producer
        });
        (rx, handle)
    }

    #[test]
    fn fill_without_producer_reports_underrun() {
        let (_producer, mut consumer) = staging_channel(stereo16(), &config(30)).unwrap();
        let mut buf = HostBuffer::new(stereo16(), 6);

        let started = Instant::now();
        let outcome = consumer.fill_host_buffer(&mut buf);
        let elapsed = started.elapsed();

        assert_eq!(outcome, FillOutcome::Underrun);
        assert!(elapsed >= Duration::from_millis(30), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "wait not bounded: {elapsed:?}");
        assert_eq!(outcome.bytes_written(), 0);
        assert!(buf.is_empty());
        let stats = consumer.bridge().stats();
        assert_eq!(stats.underrun_events, 1);
        assert_eq!(stats.silent_bytes, 24);
        assert!(consumer.bridge().is_host_ready());
    }

    #[test]
    fn split_remainder_drains_before_next_enqueue() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (done_rx, handle) = spawn_producer(producer, vec![msg(ramp(40)), msg(vec![0xAA; 8])]);
        let mut buf = HostBuffer::new(stereo16(), 6);

        // Cycle 1: slot empty, readiness raised, producer hands over 40 bytes.
        let first = consumer.fill_host_buffer(&mut buf);
        assert_eq!(first, FillOutcome::Partial { bytes: 24, remaining: 16 });
        assert_eq!(buf.as_bytes(), &ramp(40)[..24]);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)), Ok(0));
        assert_eq!(bridge.pending_bytes(), 16);
        assert!(!bridge.is_host_ready());

        // The second enqueue must still be blocked.
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        // Cycle 2: remainder only, no readiness.
        let second = consumer.fill_host_buffer(&mut buf);
        assert_eq!(second, FillOutcome::Drained { bytes: 16 });
        assert_eq!(buf.as_bytes(), &ramp(40)[24..]);
        assert!(!bridge.is_host_ready());
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        // Cycle 3: empty slot raises readiness and the next message arrives.
        let third = consumer.fill_host_buffer(&mut buf);
        assert_eq!(third, FillOutcome::Drained { bytes: 8 });
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(1)), Ok(1));

        handle.join().unwrap();
        let stats = bridge.stats();
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.messages_enqueued, 2);
        assert_eq!(stats.messages_drained, 2);
        assert_eq!(stats.bytes_written, 48);
    }

    #[test]
    fn repeated_partial_drains_reproduce_message() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let original = ramp(4 * 37);
        let (_rx, handle) = spawn_producer(producer, vec![msg(original.clone())]);

        let mut out = Vec::new();
        for frames in [1usize, 5, 3, 8, 2, 13, 40] {
            let mut buf = HostBuffer::new(stereo16(), frames);
            let outcome = consumer.fill_host_buffer(&mut buf);
            assert_eq!(outcome.bytes_written(), buf.len());
            assert!(stereo16().is_frame_aligned(buf.len()));
            out.extend_from_slice(buf.as_bytes());
            if matches!(outcome, FillOutcome::Drained { .. }) {
                break;
            }
        }

        handle.join().unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn readiness_never_raised_while_remainder_queued() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (_rx, handle) = spawn_producer(producer, vec![msg(ramp(4 * 10))]);

        let mut buf = HostBuffer::new(stereo16(), 3);
        assert!(matches!(
            consumer.fill_host_buffer(&mut buf),
            FillOutcome::Partial { .. }
        ));
        let raised_after_first = bridge.stats().ready_signals;
        while bridge.pending_bytes() > 0 {
            assert!(!bridge.is_host_ready());
            consumer.fill_host_buffer(&mut buf);
        }
        assert_eq!(bridge.stats().ready_signals, raised_after_first);
        handle.join().unwrap();
    }

    #[test]
    fn set_format_rejected_while_queued() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (_rx, handle) = spawn_producer(producer, vec![msg(ramp(40))]);

        let mut buf = HostBuffer::new(stereo16(), 2);
        consumer.fill_host_buffer(&mut buf);
        let mono24 = PcmFormat::new(SampleWidth::Bits24, 1).unwrap();
        let err = bridge.set_format(mono24).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::FormatChangePending {
                pending_bytes: 32,
                ..
            }
        ));

        let mut big = HostBuffer::new(stereo16(), 16);
        consumer.fill_host_buffer(&mut big);
        assert!(bridge.wait_until_drained(Duration::from_millis(10)));
        bridge.set_format(mono24).unwrap();
        assert_eq!(bridge.format(), mono24);
        handle.join().unwrap();
    }

    #[test]
    fn enqueue_rejects_foreign_format_and_returns_message() {
        let (mut producer, mut consumer) = staging_channel(stereo16(), &config(50)).unwrap();
        let mono8 = PcmFormat::new(SampleWidth::Bits8, 1).unwrap();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let m = PlayableAudioMessage::new(mono8, vec![1, 2, 3]).unwrap();
            let _ = tx.send(producer.enqueue(m));
        });

        let mut buf = HostBuffer::new(stereo16(), 4);
        // Raise readiness; the producer wakes but is turned away.
        assert_eq!(consumer.fill_host_buffer(&mut buf), FillOutcome::Underrun);
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            Err(BridgeError::FormatMismatch { message, got, .. }) => {
                assert_eq!(got, mono8);
                assert_eq!(message.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        handle.join().unwrap();
        assert!(consumer.bridge().is_host_ready());
    }

    #[test]
    fn close_unblocks_waiting_producer() {
        let (mut producer, consumer) = staging_channel(stereo16(), &config(10)).unwrap();
        let bridge = consumer.bridge().clone();
        let handle = thread::spawn(move || producer.enqueue(msg(ramp(8))));

        thread::sleep(Duration::from_millis(20));
        bridge.close();
        let res = handle.join().unwrap();
        assert!(matches!(res, Err(BridgeError::Closed)));
        assert!(bridge.is_closed());
    }

    #[test]
    fn closed_bridge_drains_remainder_then_reports_closed() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (_rx, handle) = spawn_producer(producer, vec![msg(ramp(16))]);

        let mut buf = HostBuffer::new(stereo16(), 2);
        assert!(matches!(
            consumer.fill_host_buffer(&mut buf),
            FillOutcome::Partial { bytes: 8, .. }
        ));
        handle.join().unwrap();
        bridge.close();

        assert_eq!(consumer.fill_host_buffer(&mut buf), FillOutcome::Drained { bytes: 8 });
        assert_eq!(consumer.fill_host_buffer(&mut buf), FillOutcome::Closed);
    }

    #[test]
    fn per_sample_copy_mode_matches_bulk_output() {
        let cfg = BridgeConfig {
            copy_mode: CopyMode::PerSample,
            ..config(200)
        };
        let format = PcmFormat::new(SampleWidth::Bits24, 2).unwrap();
        let (producer, mut consumer) = staging_channel(format, &cfg).unwrap();
        let original = ramp(6 * 5);
        let m = PlayableAudioMessage::new(format, original.clone()).unwrap();
        let (_rx, handle) = spawn_producer(producer, vec![m]);

        let mut buf = HostBuffer::new(format, 8);
        assert_eq!(consumer.fill_host_buffer(&mut buf), FillOutcome::Drained { bytes: 30 });
        assert_eq!(buf.as_bytes(), &original[..]);
        handle.join().unwrap();
    }

    #[test]
    fn cursor_tracks_last_fill_and_can_be_rearmed() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (_rx, handle) = spawn_producer(producer, vec![msg(ramp(12))]);

        let mut buf = HostBuffer::new(stereo16(), 5);
        consumer.fill_host_buffer(&mut buf);
        assert_eq!(
            bridge.cursor(),
            BufferCursor {
                write_offset: 12,
                remaining: 8
            }
        );
        bridge.arm_buffer(20);
        assert_eq!(
            bridge.cursor(),
            BufferCursor {
                write_offset: 0,
                remaining: 20
            }
        );
        handle.join().unwrap();
    }

    #[test]
    fn empty_message_is_dropped_without_waiting() {
        let (mut producer, _consumer) = staging_channel(stereo16(), &config(10)).unwrap();
        producer.enqueue(msg(Vec::new())).unwrap();
        assert_eq!(producer.bridge().stats().messages_enqueued, 0);
    }

    #[test]
    fn late_enqueue_inside_timeout_is_delivered() {
        let (mut producer, mut consumer) = staging_channel(stereo16(), &config(400)).unwrap();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            producer.enqueue(msg(ramp(8))).unwrap();
            producer
        });

        let mut buf = HostBuffer::new(stereo16(), 4);
        let started = Instant::now();
        let outcome = consumer.fill_host_buffer(&mut buf);
        let elapsed = started.elapsed();

        assert_eq!(outcome, FillOutcome::Drained { bytes: 8 });
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(400));
        handle.join().unwrap();
    }

    #[test]
    fn fill_budget_caps_wait_below_fill_timeout() {
        let (_producer, mut consumer) = staging_channel(stereo16(), &config(500)).unwrap();
        let mut buf = HostBuffer::new(stereo16(), 4);

        let started = Instant::now();
        let outcome = consumer.fill_host_buffer_within(&mut buf, Duration::from_millis(20));
        let elapsed = started.elapsed();

        assert_eq!(outcome, FillOutcome::Underrun);
        assert!(elapsed < Duration::from_millis(250), "budget ignored: {elapsed:?}");
    }

    #[test]
    fn partial_fill_leaves_remainder_queued_and_nothing_in_flight() {
        let (producer, mut consumer) = staging_channel(stereo16(), &config(200)).unwrap();
        let bridge = consumer.bridge().clone();
        let (_rx, handle) = spawn_producer(producer, vec![msg(ramp(40))]);

        let mut buf = HostBuffer::new(stereo16(), 6);
        assert_eq!(
            consumer.fill_host_buffer(&mut buf),
            FillOutcome::Partial { bytes: 24, remaining: 16 }
        );

        // The remainder is reported as queued, not as an in-flight drain.
        assert!(!bridge.wait_until_drained(Duration::ZERO));
        let mono24 = PcmFormat::new(SampleWidth::Bits24, 1).unwrap();
        assert!(matches!(
            bridge.set_format(mono24),
            Err(BridgeError::FormatChangePending {
                pending_bytes: 16,
                ..
            })
        ));
        handle.join().unwrap();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not whole")]
    fn misaligned_host_buffer_is_rejected() {
        let (_producer, mut consumer) = staging_channel(stereo16(), &config(10)).unwrap();
        let mono8 = PcmFormat::new(SampleWidth::Bits8, 1).unwrap();
        let mut buf = HostBuffer::new(mono8, 3);
        consumer.fill_host_buffer(&mut buf);
    }
}
