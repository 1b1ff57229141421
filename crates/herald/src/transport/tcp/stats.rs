// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-socket counters shared between a publish socket and the I/O thread.
//!
//! # Example
//!
//! ```
//! use herald::transport::SocketStats;
//!
//! let stats = SocketStats::new();
//! stats.record_sent();
//! assert_eq!(stats.snapshot().messages_sent, 1);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Counters for one publish socket.
#[derive(Debug)]
pub struct SocketStats {
    /// Subscribers currently connected
    subscribers: AtomicUsize,

    /// Messages accepted by the socket
    messages_sent: AtomicU64,

    /// Per-subscriber copies dropped because the queue was full
    messages_dropped: AtomicU64,

    /// Bytes written to subscribers (including framing)
    bytes_written: AtomicU64,

    /// When the socket was created
    created: Instant,
}

impl Default for SocketStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketStats {
    pub fn new() -> Self {
        Self {
            subscribers: AtomicUsize::new(0),
            messages_sent: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Subscribers currently connected.
    pub fn subscribers(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }

    pub fn record_subscriber_connected(&self) {
        self.subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_subscriber_disconnected(&self) {
        // Saturate at zero
        let _ = self
            .subscribers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn record_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> SocketStatsSnapshot {
        SocketStatsSnapshot {
            subscribers: self.subscribers(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of [`SocketStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketStatsSnapshot {
    pub subscribers: usize,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub bytes_written: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_gauge_saturates() {
        let stats = SocketStats::new();
        stats.record_subscriber_connected();
        stats.record_subscriber_disconnected();
        stats.record_subscriber_disconnected();
        assert_eq!(stats.subscribers(), 0);
    }

    #[test]
    fn test_snapshot() {
        let stats = SocketStats::new();
        stats.record_sent();
        stats.record_sent();
        stats.record_dropped();
        stats.record_bytes_written(100);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.bytes_written, 100);
    }
}
