// Settings: read-only view of the effective configuration and server health.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::tui::ViewState;
use super::status_bar::server_indicator;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let settings = &state.snapshot.settings;
    let (dot, color, server_label) = server_indicator(&state.snapshot.server_status);

    let row = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<16}", label), Style::default().fg(Color::Gray)),
            Span::styled(value, Style::default().fg(Color::White)),
        ])
    };

    let lines = vec![
        row("API URL", settings.api_url.clone()),
        row("Local storage", settings.storage_path.clone()),
        row("History limit", settings.history_limit.to_string()),
        Line::from(vec![
            Span::styled(format!("{:<16}", "Server"), Style::default().fg(Color::Gray)),
            Span::styled(format!("{} ", dot), Style::default().fg(color)),
            Span::raw(server_label),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "Edit config/client.toml and restart to change these values.",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Settings"));
    frame.render_widget(paragraph, area);
}
