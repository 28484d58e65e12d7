// Dashboard: greeting and a summary of the current session.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let snapshot = &state.snapshot;
    let name = snapshot
        .session
        .user()
        .map(|u| u.username.as_str())
        .unwrap_or("");

    let mut lines = vec![
        Line::from(Span::styled(
            "Welcome to SmartBasket",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Hello, {}.", name)),
        Line::default(),
        Line::from("Build a basket on the Predictions screen and SmartBasket suggests"),
        Line::from("what you are likely to buy next."),
        Line::default(),
        Line::from(format!("Items in basket:      {}", snapshot.basket.len())),
        Line::from(format!("Predictions this run: {}", snapshot.history.len())),
    ];
    if let Some(prediction) = &snapshot.prediction {
        lines.push(Line::from(format!(
            "Latest suggestion:    {}",
            prediction.predicted_names()
        )));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Dashboard"));
    frame.render_widget(paragraph, area);
}
