use crate::state::Dashboard;
use crate::theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use snare_core::{format_bytes, format_duration};

/// Three fixed panes: active connections top-left, stats top-right, log
/// across the bottom. Recomputed from the frame area on every draw, so a
/// resize just falls out of the next render.
pub fn render(f: &mut Frame, dash: &Dashboard) {
    let bands = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(f.size());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(bands[0]);

    render_connections(f, dash, top[0]);
    render_stats(f, dash, top[1]);
    render_log(f, dash, bands[1]);
}

fn render_connections(f: &mut Frame, dash: &Dashboard, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!("({}) Active connections", dash.active_connections),
        theme::TITLE_STYLE,
    ));
    let lines: Vec<Line> = dash
        .connection_rows
        .iter()
        .map(|row| Line::from(Span::styled(row.clone(), theme::CONNECTION_STYLE)))
        .collect();
    let p = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    f.render_widget(p, area);
}

fn render_stats(f: &mut Frame, dash: &Dashboard, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled("Stats", theme::TITLE_STYLE));
    let lines = vec![
        Line::from(format!("Total conns: {}", dash.stats.total_connections)),
        Line::from(format!(
            "Total bytes: {}",
            format_bytes(dash.stats.total_bytes)
        )),
        Line::from(format!("Uptime: {:>7}", format_duration(dash.stats.uptime))),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(f: &mut Frame, dash: &Dashboard, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled("Log", theme::TITLE_STYLE));
    let inner = block.inner(area);

    // Most-recent-last; when the pane is shorter than the log, show the tail.
    let visible = inner.height as usize;
    let skip = dash.log_lines.len().saturating_sub(visible);
    let lines: Vec<Line> = dash.log_lines[skip..]
        .iter()
        .map(|entry| Line::from(Span::styled(entry.clone(), theme::LOG_STYLE)))
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), area);
}
