use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection registry lock poisoned")]
    Poisoned,
}

/// Read-only view of one live connection. The byte counter is shared with
/// the connection's writer task and read live at sample time; nothing on the
/// dashboard side ever mutates it.
#[derive(Clone, Debug)]
pub struct ConnectionView {
    started: Instant,
    remote: String,
    written: Arc<AtomicU64>,
}

impl ConnectionView {
    pub fn new(started: Instant, remote: impl Into<String>, written: Arc<AtomicU64>) -> Self {
        Self {
            started,
            remote: remote.into(),
            written,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Monotonically non-decreasing count of bytes written to the peer.
    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

/// Point-in-time snapshot of the server. `bytes_sent` covers connections
/// that have already closed; `bytes_sent` plus the sum of live
/// `bytes_written()` values is the lifetime byte total.
#[derive(Clone, Debug, Default)]
pub struct ServerState {
    pub connections: Vec<ConnectionView>,
    pub total_connections: u64,
    pub bytes_sent: u64,
}

/// Sorts connections oldest-first. The sort is stable, so equal start times
/// keep their relative input order.
pub fn order_by_started(mut connections: Vec<ConnectionView>) -> Vec<ConnectionView> {
    connections.sort_by_key(ConnectionView::started);
    connections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn view(started: Instant, remote: &str) -> ConnectionView {
        ConnectionView::new(started, remote, Arc::new(AtomicU64::new(0)))
    }

    #[test]
    fn orders_by_start_time_ascending() {
        let base = Instant::now();
        let conns = vec![
            view(base + Duration::from_secs(20), "c"),
            view(base, "a"),
            view(base + Duration::from_secs(10), "b"),
        ];

        let ordered = order_by_started(conns);
        let remotes: Vec<&str> = ordered.iter().map(ConnectionView::remote).collect();
        assert_eq!(remotes, vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_start_times_keep_input_order() {
        let base = Instant::now();
        let conns = vec![view(base, "first"), view(base, "second"), view(base, "third")];

        let ordered = order_by_started(conns);
        let remotes: Vec<&str> = ordered.iter().map(ConnectionView::remote).collect();
        assert_eq!(remotes, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(order_by_started(Vec::new()).is_empty());
    }

    #[test]
    fn bytes_written_reads_the_live_counter() {
        let counter = Arc::new(AtomicU64::new(0));
        let conn = ConnectionView::new(Instant::now(), "peer", counter.clone());
        assert_eq!(conn.bytes_written(), 0);

        counter.fetch_add(42, Ordering::Relaxed);
        assert_eq!(conn.bytes_written(), 42);
    }
}
