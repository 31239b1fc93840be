use crate::registry::{ConnectionTicket, Registry};
use snare_core::{format_bytes, format_duration, ServerState, StateError};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const BANNER_INTERVAL: Duration = Duration::from_secs(2);

/// SSH-facing tarpit. Accepted clients get an endless drip of pre-version
/// banner lines while the registry tracks what each connection has been fed.
pub struct Tarpit {
    registry: Arc<Registry>,
    events: mpsc::Sender<String>,
}

impl Tarpit {
    pub fn new(events: mpsc::Sender<String>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            events,
        }
    }

    /// Snapshot of the live connection set and cumulative totals. Safe to
    /// call concurrently with the accept path.
    pub fn state(&self) -> Result<ServerState, StateError> {
        self.registry.state()
    }

    /// Binds the listen socket. Kept separate from `serve` so a bind failure
    /// surfaces before the caller takes over the terminal.
    pub async fn bind(&self, port: u16) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(event = "tarpit_listen", addr = %listener.local_addr()?);
        Ok(listener)
    }

    pub async fn serve(&self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, addr)) => {
                            let registry = self.registry.clone();
                            let events = self.events.clone();
                            let conn_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                serve_connection(stream, addr.to_string(), registry, events, conn_shutdown).await;
                            });
                        }
                        Err(err) => {
                            warn!(event = "tarpit_accept_error", error = %err);
                        }
                    }
                }
            }
        }
        info!(event = "tarpit_stop");
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    remote: String,
    registry: Arc<Registry>,
    events: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let ticket = match registry.open(&remote) {
        Ok(ticket) => ticket,
        Err(err) => {
            warn!(event = "tarpit_register_error", remote = %remote, error = %err);
            return;
        }
    };
    let started = Instant::now();
    let _ = events.send(format!("connection opened from {remote}")).await;
    info!(event = "tarpit_conn_open", remote = %remote, id = ticket.id());

    drip_banner(&mut stream, &remote, &ticket, &mut shutdown).await;

    let written = registry.close(&ticket).unwrap_or(0);
    let _ = events
        .send(format!(
            "connection closed: {} after {}",
            format_bytes(written),
            format_duration(started.elapsed())
        ))
        .await;
    info!(event = "tarpit_conn_closed", remote = %remote, bytes = written);
}

async fn drip_banner(
    stream: &mut TcpStream,
    remote: &str,
    ticket: &ConnectionTicket,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut banner = BannerLines::new(ticket.id());
    let mut ticker = tokio::time::interval(BANNER_INTERVAL);
    let (mut reader, mut writer) = stream.split();
    let mut discard = [0u8; 1024];

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let line = banner.next_line();
                match writer.write_all(line.as_bytes()).await {
                    Ok(()) => ticket.add_written(line.len() as u64),
                    Err(err) => {
                        debug!(event = "tarpit_conn_write_error", remote = %remote, error = %err);
                        break;
                    }
                }
            }
            read = reader.read(&mut discard) => {
                match read {
                    // Whatever the client sends before giving up is noise to
                    // us, but a zero-length read means it hung up.
                    Ok(0) => break,
                    Ok(n) => debug!(event = "tarpit_conn_read", remote = %remote, bytes = n),
                    Err(err) => {
                        debug!(event = "tarpit_conn_read_error", remote = %remote, error = %err);
                        break;
                    }
                }
            }
        }
    }
}

/// Endless pre-version banner payload. SSH clients wait for a line starting
/// with "SSH-" before continuing the handshake, so anything else keeps them
/// hanging. A per-connection xorshift keeps the lines from being a fixed
/// string a scanner could special-case.
struct BannerLines {
    state: u64,
}

impl BannerLines {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1,
        }
    }

    fn next_line(&mut self) -> String {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        format!("{x:016x}\r\n")
    }
}
