use snare_core::{ConnectionView, ServerState, StateError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct Entry {
    started: Instant,
    remote: String,
    written: Arc<AtomicU64>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<u64, Entry>,
    total_connections: u64,
    bytes_sent: u64,
}

/// Shared connection bookkeeping. One mutex guards all of it, so `state()`
/// returns a consistent point-in-time view even while connections are being
/// accepted and torn down.
#[derive(Default)]
pub struct Registry {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

/// Handle for one live connection. The writer task bumps the byte counter
/// through it and returns it to `close` when the peer goes away.
pub struct ConnectionTicket {
    id: u64,
    written: Arc<AtomicU64>,
}

impl ConnectionTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn add_written(&self, bytes: u64) {
        self.written.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, remote: &str) -> Result<ConnectionTicket, StateError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let written = Arc::new(AtomicU64::new(0));
        let mut inner = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        inner.total_connections += 1;
        inner.connections.insert(
            id,
            Entry {
                started: Instant::now(),
                remote: remote.to_string(),
                written: written.clone(),
            },
        );
        Ok(ConnectionTicket { id, written })
    }

    /// Removes the connection and folds its byte count into `bytes_sent`.
    /// Returns the bytes the connection wrote over its lifetime.
    pub fn close(&self, ticket: &ConnectionTicket) -> Result<u64, StateError> {
        let mut inner = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        match inner.connections.remove(&ticket.id) {
            Some(entry) => {
                let written = entry.written.load(Ordering::Relaxed);
                inner.bytes_sent += written;
                Ok(written)
            }
            None => Ok(0),
        }
    }

    pub fn state(&self) -> Result<ServerState, StateError> {
        let inner = self.inner.lock().map_err(|_| StateError::Poisoned)?;
        Ok(ServerState {
            connections: inner
                .connections
                .values()
                .map(|entry| {
                    ConnectionView::new(entry.started, entry.remote.clone(), entry.written.clone())
                })
                .collect(),
            total_connections: inner.total_connections,
            bytes_sent: inner.bytes_sent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifetime_bytes(state: &ServerState) -> u64 {
        state.bytes_sent
            + state
                .connections
                .iter()
                .map(ConnectionView::bytes_written)
                .sum::<u64>()
    }

    #[test]
    fn state_reflects_open_connections() {
        let registry = Registry::new();
        let first = registry.open("10.0.0.1:50000").unwrap();
        let second = registry.open("10.0.0.2:50001").unwrap();
        first.add_written(100);
        second.add_written(50);

        let state = registry.state().unwrap();
        assert_eq!(state.connections.len(), 2);
        assert_eq!(state.total_connections, 2);
        assert_eq!(state.bytes_sent, 0);
        assert_eq!(lifetime_bytes(&state), 150);
    }

    #[test]
    fn close_folds_bytes_into_sent_total() {
        let registry = Registry::new();
        let ticket = registry.open("10.0.0.1:50000").unwrap();
        ticket.add_written(400);

        assert_eq!(registry.close(&ticket).unwrap(), 400);

        let state = registry.state().unwrap();
        assert!(state.connections.is_empty());
        assert_eq!(state.total_connections, 1);
        assert_eq!(state.bytes_sent, 400);
    }

    #[test]
    fn lifetime_bytes_never_decrease_across_a_close() {
        let registry = Registry::new();
        let ticket = registry.open("10.0.0.1:50000").unwrap();
        ticket.add_written(250);
        let keep = registry.open("10.0.0.2:50001").unwrap();
        keep.add_written(10);

        let before = lifetime_bytes(&registry.state().unwrap());
        registry.close(&ticket).unwrap();
        let after = lifetime_bytes(&registry.state().unwrap());

        assert!(after >= before);
        assert_eq!(after, 260);
    }

    #[test]
    fn total_connections_counts_every_accept() {
        let registry = Registry::new();
        for i in 0..5 {
            let ticket = registry.open(&format!("10.0.0.{i}:50000")).unwrap();
            registry.close(&ticket).unwrap();
        }
        let state = registry.state().unwrap();
        assert_eq!(state.total_connections, 5);
        assert!(state.connections.is_empty());
    }

    #[test]
    fn closing_twice_is_harmless() {
        let registry = Registry::new();
        let ticket = registry.open("10.0.0.1:50000").unwrap();
        ticket.add_written(7);
        assert_eq!(registry.close(&ticket).unwrap(), 7);
        assert_eq!(registry.close(&ticket).unwrap(), 0);
        assert_eq!(registry.state().unwrap().bytes_sent, 7);
    }
}
