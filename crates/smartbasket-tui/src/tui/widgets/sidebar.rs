// Sidebar widget: numbered navigation list.
//
// Entries are bound to digit keys in order. The admin entry only appears
// for admin users.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem};
use ratatui::Frame;

use crate::router::Route;
use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let current = state.snapshot.route;
    let items: Vec<ListItem> = Route::sidebar_routes(state.is_admin())
        .into_iter()
        .enumerate()
        .map(|(i, route)| {
            let style = if route == current {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {} ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(route.title(), style),
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Menu"));
    frame.render_widget(list, area);
}
