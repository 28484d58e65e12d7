// Profile: the signed-in user's account details.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Profile");
    let Some(user) = state.snapshot.session.user() else {
        frame.render_widget(Paragraph::new("Not logged in").block(block), area);
        return;
    };

    let created = user
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let status = if user.is_active { "Active" } else { "Inactive" };

    let lines: Vec<Line> = [
        ("Username", user.username.clone()),
        ("Email", user.email.clone()),
        ("Role", user.role.as_str().to_string()),
        ("Status", status.to_string()),
        ("Account Created", created),
    ]
    .into_iter()
    .map(|(label, value)| {
        Line::from(vec![
            Span::styled(format!("{:<16}", label), Style::default().fg(Color::Gray)),
            Span::styled(value, Style::default().fg(Color::White)),
        ])
    })
    .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
