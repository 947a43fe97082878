// src/shared/stats.rs
//! Runtime counters for the listener and worker pools.
//!
//! Counters are relaxed atomics: they are updated on the hot path without
//! taking the buffer lock, so a snapshot taken while the engine runs may be
//! slightly inconsistent across fields.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by every engine thread.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub(crate) datagrams_received: AtomicU64,
    pub(crate) bytes_received: AtomicU64,
    pub(crate) bytes_dropped: AtomicU64,
    pub(crate) overflow_events: AtomicU64,
    pub(crate) recv_errors: AtomicU64,
    pub(crate) callback_invocations: AtomicU64,
    pub(crate) bytes_delivered: AtomicU64,
    pub(crate) callback_panics: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self, dropped: usize) {
        self.overflow_events.fetch_add(1, Ordering::Relaxed);
        self.bytes_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, len: usize) {
        self.callback_invocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_callback_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            overflow_events: self.overflow_events.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            callback_invocations: self.callback_invocations.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`EngineStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams read from the socket
    pub datagrams_received: u64,
    /// Payload bytes read from the socket
    pub bytes_received: u64,
    /// Bytes discarded because the ring or hand-off channel was full
    pub bytes_dropped: u64,
    /// Number of pushes that were cut short
    pub overflow_events: u64,
    /// Failed socket receives
    pub recv_errors: u64,
    /// Completed callback calls
    pub callback_invocations: u64,
    /// Bytes handed to the callback
    pub bytes_delivered: u64,
    /// Callback calls that panicked
    pub callback_panics: u64,
}

impl StatsSnapshot {
    /// Percentage (0.0-100.0) of received bytes that were dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use udpring::StatsSnapshot;
    ///
    /// let stats = StatsSnapshot {
    ///     bytes_received: 200,
    ///     bytes_dropped: 50,
    ///     ..Default::default()
    /// };
    /// assert_eq!(stats.drop_rate(), 25.0);
    /// ```
    pub fn drop_rate(&self) -> f64 {
        if self.bytes_received == 0 {
            return 0.0;
        }
        (self.bytes_dropped as f64 / self.bytes_received as f64) * 100.0
    }

    /// Bytes accepted into the ring but not yet handed to the callback.
    pub fn in_flight(&self) -> u64 {
        self.bytes_received
            .saturating_sub(self.bytes_dropped)
            .saturating_sub(self.bytes_delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_counters() {
        let stats = EngineStats::default();
        stats.record_datagram(100);
        stats.record_datagram(20);
        stats.record_overflow(20);
        stats.record_delivery(60);

        let snap = stats.snapshot();
        assert_eq!(snap.datagrams_received, 2);
        assert_eq!(snap.bytes_received, 120);
        assert_eq!(snap.overflow_events, 1);
        assert_eq!(snap.in_flight(), 40);
    }

    #[test]
    fn test_drop_rate_empty() {
        assert_eq!(StatsSnapshot::default().drop_rate(), 0.0);
    }
}
