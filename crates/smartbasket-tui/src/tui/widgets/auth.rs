// Login and registration screens.
//
// Both render a centered bordered form: one row per field with the focused
// field highlighted, an inline error line, and a hint for switching
// screens.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::tui::form::FormState;
use super::quit_confirm::centered_rect;

const FORM_WIDTH: u16 = 50;

pub fn render_login(frame: &mut Frame, area: Rect, form: &FormState) {
    render_form(frame, area, "Login", form, "Ctrl+N: create an account");
}

pub fn render_register(frame: &mut Frame, area: Rect, form: &FormState) {
    render_form(frame, area, "Register", form, "Esc: back to login");
}

/// Render a labelled form centered in `area`.
pub fn render_form(frame: &mut Frame, area: Rect, title: &str, form: &FormState, hint: &str) {
    let lines = form_lines(form, hint);
    let height = lines.len() as u16 + 2;
    let rect = centered_rect(FORM_WIDTH, height, area);

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(format!(" {} ", title)),
    );
    frame.render_widget(paragraph, rect);
}

/// Field rows, the error line (if any), and the hint.
pub fn form_lines(form: &FormState, hint: &str) -> Vec<Line<'static>> {
    let label_width = form
        .fields
        .iter()
        .map(|f| f.label.len())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<Line> = form
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let focused = i == form.focus;
            let marker = if focused { ">" } else { " " };
            let value_style = if focused {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
            } else {
                Style::default().fg(Color::White)
            };
            let mut value = field.display_value();
            if focused {
                value.push('_');
            }
            Line::from(vec![
                Span::styled(format!("{} ", marker), Style::default().fg(Color::Green)),
                Span::styled(
                    format!("{:<width$}: ", field.label, width = label_width),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(value, value_style),
            ])
        })
        .collect();

    lines.push(Line::default());
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            format!("  {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("  {}", hint),
        Style::default().fg(Color::DarkGray),
    )));
    lines
}
