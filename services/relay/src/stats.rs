//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::relay::Direction;

/// Statistics for one engine run.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Total connections accepted (or dialed, for the receive client).
    pub connections_accepted: AtomicU64,
    /// Connections currently active.
    pub connections_active: AtomicU64,
    /// Connections that have finished.
    pub connections_closed: AtomicU64,
    /// Connections closed immediately because the limit was reached.
    pub connections_rejected: AtomicU64,
    /// Failed destination dials.
    pub dial_failures: AtomicU64,
    /// Bytes read from the initiating side.
    pub bytes_outbound: AtomicU64,
    /// Bytes read from the far side.
    pub bytes_inbound: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_bytes(&self, direction: Direction, n: usize) {
        let counter = match direction {
            Direction::Outbound => &self.bytes_outbound,
            Direction::Inbound => &self.bytes_inbound,
        };
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.connections_accepted.load(Ordering::Relaxed),
            active: self.connections_active.load(Ordering::Relaxed),
            closed: self.connections_closed.load(Ordering::Relaxed),
            rejected: self.connections_rejected.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            bytes_outbound: self.bytes_outbound.load(Ordering::Relaxed),
            bytes_inbound: self.bytes_inbound.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub active: u64,
    pub closed: u64,
    pub rejected: u64,
    pub dial_failures: u64,
    pub bytes_outbound: u64,
    pub bytes_inbound: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lifecycle_counters() {
        let stats = EngineStats::default();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.active, 1);
        assert_eq!(snapshot.closed, 1);
    }

    #[test]
    fn test_bytes_by_direction() {
        let stats = EngineStats::default();
        stats.record_bytes(Direction::Outbound, 10);
        stats.record_bytes(Direction::Inbound, 3);
        stats.record_bytes(Direction::Outbound, 5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_outbound, 15);
        assert_eq!(snapshot.bytes_inbound, 3);
    }
}
