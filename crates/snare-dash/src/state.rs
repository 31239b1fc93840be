use snare_core::{format_bytes, format_duration, order_by_started, ServerState};
use std::time::{Duration, Instant};

/// Aggregates for the stats pane, computed by the sampling loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_connections: u64,
    pub total_bytes: u64,
    pub uptime: Duration,
}

/// One unit of deferred display work. Producers build these; only the
/// renderer applies them, one at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderCommand {
    /// Full repaint of the connections and stats panes from one sample.
    Frame {
        rows: Vec<String>,
        active: usize,
        stats: Stats,
    },
    /// Repaint of the log pane with the ring buffer's current contents.
    Log(Vec<String>),
}

/// All pane state, owned exclusively by the renderer.
#[derive(Debug, Default)]
pub struct Dashboard {
    pub connection_rows: Vec<String>,
    pub active_connections: usize,
    pub stats: Stats,
    pub log_lines: Vec<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Frame { rows, active, stats } => {
                self.connection_rows = rows;
                self.active_connections = active;
                self.stats = stats;
            }
            RenderCommand::Log(lines) => {
                self.log_lines = lines;
            }
        }
    }
}

/// Turns one server snapshot into a render command: connections sorted
/// oldest-first, one formatted row per connection, and the derived totals.
pub fn build_frame(state: ServerState, sampled_at: Instant, dash_started: Instant) -> RenderCommand {
    let connections = order_by_started(state.connections);
    let mut active_bytes = 0u64;
    let rows: Vec<String> = connections
        .iter()
        .map(|conn| {
            let written = conn.bytes_written();
            active_bytes += written;
            let elapsed = sampled_at.saturating_duration_since(conn.started());
            format!(
                "{:>11}: {:>9}: {}",
                format_duration(elapsed),
                format_bytes(written),
                conn.remote()
            )
        })
        .collect();

    RenderCommand::Frame {
        active: connections.len(),
        rows,
        stats: Stats {
            total_connections: state.total_connections,
            total_bytes: state.bytes_sent + active_bytes,
            uptime: sampled_at.saturating_duration_since(dash_started),
        },
    }
}
