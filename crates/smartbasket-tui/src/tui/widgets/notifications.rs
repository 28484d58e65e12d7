// Toast stack in the bottom-right corner, newest at the bottom.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::protocol::NotificationLevel;
use crate::tui::Toast;

const TOAST_WIDTH: u16 = 40;
const TOAST_HEIGHT: u16 = 3;

pub fn render(frame: &mut Frame, area: Rect, toasts: &[Toast]) {
    let width = TOAST_WIDTH.min(area.width);
    // Keep the help bar visible.
    let mut bottom = area.y + area.height.saturating_sub(1);
    for toast in toasts.iter().rev() {
        if bottom < area.y + TOAST_HEIGHT {
            break;
        }
        let rect = Rect::new(
            area.x + area.width - width,
            bottom - TOAST_HEIGHT,
            width,
            TOAST_HEIGHT,
        );
        bottom -= TOAST_HEIGHT;

        let color = level_color(toast.notification.level);
        frame.render_widget(Clear, rect);
        let paragraph = Paragraph::new(toast.notification.message.as_str())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(color).bg(Color::Black))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            );
        frame.render_widget(paragraph, rect);
    }
}

pub fn level_color(level: NotificationLevel) -> Color {
    match level {
        NotificationLevel::Success => Color::Green,
        NotificationLevel::Info => Color::Cyan,
        NotificationLevel::Warning => Color::Yellow,
        NotificationLevel::Error => Color::Red,
    }
}
