use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Lock-free counters updated from both sides of the bridge.
///
/// Written with `Relaxed` ordering; values are diagnostics, not synchronization.
#[derive(Debug, Default)]
pub struct BridgeCounters {
    /// Messages accepted by `enqueue`.
    pub messages_enqueued: AtomicU64,
    /// Messages (including their split tails) fully drained.
    pub messages_drained: AtomicU64,
    /// Splits performed when a message outlasted a host buffer.
    pub splits: AtomicU64,
    /// Fill cycles run.
    pub fills: AtomicU64,
    /// Bytes copied into host buffers.
    pub bytes_written: AtomicU64,
    /// Fills that timed out waiting for the producer.
    pub underrun_events: AtomicU64,
    /// Host buffer bytes submitted as silence because of underruns.
    pub silent_bytes: AtomicU64,
    /// Times the readiness signal was raised.
    pub ready_signals: AtomicU64,
    last_underrun_log_ms: AtomicU64,
}

/// Point-in-time copy of [`BridgeCounters`] for logs and reports.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeStats {
    pub messages_enqueued: u64,
    pub messages_drained: u64,
    pub splits: u64,
    pub fills: u64,
    pub bytes_written: u64,
    pub underrun_events: u64,
    pub silent_bytes: u64,
    pub ready_signals: u64,
}

impl BridgeCounters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    /// Return a snapshot suitable for reporting.
    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_drained: self.messages_drained.load(Ordering::Relaxed),
            splits: self.splits.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            underrun_events: self.underrun_events.load(Ordering::Relaxed),
            silent_bytes: self.silent_bytes.load(Ordering::Relaxed),
            ready_signals: self.ready_signals.load(Ordering::Relaxed),
        }
    }

    /// Whether an underrun warning should be logged now.
    ///
    /// Allows the first warning and then at most one per second.
    pub(crate) fn should_log_underrun(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_millis() as u64;
        let last = self.last_underrun_log_ms.load(Ordering::Relaxed);
        if last == 0 || now.saturating_sub(last) > 1000 {
            self.last_underrun_log_ms.store(now.max(1), Ordering::Relaxed);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let c = BridgeCounters::default();
        BridgeCounters::bump(&c.fills, 3);
        BridgeCounters::bump(&c.bytes_written, 96);
        BridgeCounters::bump(&c.underrun_events, 1);

        let snap = c.snapshot();
        assert_eq!(snap.fills, 3);
        assert_eq!(snap.bytes_written, 96);
        assert_eq!(snap.underrun_events, 1);
        assert_eq!(snap.splits, 0);
    }

    #[test]
    fn underrun_logging_is_rate_limited() {
        let c = BridgeCounters::default();
        assert!(c.should_log_underrun());
        assert!(!c.should_log_underrun());
    }
}
