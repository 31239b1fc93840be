mod loops;
mod state;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use snare_server::Tarpit;
use state::RenderCommand;
use std::{io, sync::Arc, time::Instant};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_QUEUE_CAPACITY: usize = 256;
const RENDER_QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "snare-dash", about = "SSH tarpit with a live terminal dashboard")]
struct Cli {
    /// Port the tarpit listens on.
    #[arg(long, default_value_t = 22)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let (render_tx, render_rx) = mpsc::channel(RENDER_QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let tarpit = Arc::new(Tarpit::new(event_tx));
    // Bind before taking over the terminal so a bad port fails in plain text.
    let listener = tarpit.bind(cli.port).await?;
    info!(event = "dash_start", port = cli.port);

    {
        let tarpit = tarpit.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            tarpit.serve(listener, shutdown).await;
        });
    }

    let dash_started = Instant::now();
    tokio::spawn(loops::sample_loop(
        tarpit.clone(),
        render_tx.clone(),
        dash_started,
        shutdown_rx.clone(),
    ));
    tokio::spawn(loops::event_loop(event_rx, render_tx, shutdown_rx));

    let mut terminal = setup_terminal()?;
    let result = run_renderer(&mut terminal, render_rx).await;
    restore_terminal(&mut terminal)?;
    let _ = shutdown_tx.send(true);
    info!(event = "dash_stop");
    result
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("SNARE_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        // The terminal belongs to the dashboard; logs go nowhere unless asked.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// The renderer: sole owner of the terminal and all pane state. Applies
/// queued render commands in arrival order and handles keyboard input.
async fn run_renderer(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut commands: mpsc::Receiver<RenderCommand>,
) -> Result<()> {
    let mut dash = state::Dashboard::new();
    let mut input = EventStream::new();

    loop {
        terminal.draw(|f| ui::render(f, &dash))?;

        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(command) => dash.apply(command),
                    // Both producer loops gone; nothing left to show.
                    None => break,
                }
            }
            maybe_event = input.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key)))
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
                    {
                        if is_quit(key) {
                            break;
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {
                        // Layout is recomputed on the next draw.
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(event = "dash_input_error", error = %err);
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn is_quit(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        assert!(is_quit(key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn other_keys_do_not_quit() {
        assert!(!is_quit(key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit(key(KeyCode::Esc, KeyModifiers::NONE)));
    }
}
