use ratatui::style::{Color, Modifier, Style};

pub const CONNECTION_STYLE: Style = Style::new().fg(Color::Green);
pub const LOG_STYLE: Style = Style::new().fg(Color::Yellow);
pub const TITLE_STYLE: Style = Style::new().add_modifier(Modifier::BOLD);
