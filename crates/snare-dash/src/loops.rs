use crate::state::{build_frame, RenderCommand};
use snare_core::EventLog;
use snare_server::Tarpit;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the tarpit every tick and hands one frame to the renderer. A failed
/// sample skips the frame; a full render queue drops it (the next tick
/// supersedes it); a closed queue means the renderer is gone.
pub async fn sample_loop(
    tarpit: Arc<Tarpit>,
    commands: mpsc::Sender<RenderCommand>,
    dash_started: Instant,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let state = match tarpit.state() {
                    Ok(state) => state,
                    Err(err) => {
                        warn!(event = "sample_failed", error = %err);
                        continue;
                    }
                };
                match commands.try_send(build_frame(state, Instant::now(), dash_started)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(event = "render_queue_full", source = "sampler");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    info!(event = "sample_loop_stop");
}

/// Blocks on the event stream, folds each event into the bounded log, and
/// hands the renderer a fresh copy of the log pane.
pub async fn event_loop(
    mut events: mpsc::Receiver<String>,
    commands: mpsc::Sender<RenderCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut log = EventLog::new();
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                log.append(event);
                match commands.try_send(RenderCommand::Log(log.snapshot())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        // The buffer keeps the event; the next append repaints.
                        debug!(event = "render_queue_full", source = "events");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    info!(event = "event_loop_stop");
}
