// Transactions: past baskets, newest first, scrollable.

use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};
use ratatui::Frame;

use smartbasket_core::models::Transaction;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let transactions = &state.snapshot.transactions;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Your Transactions ({})", transactions.len()));

    if transactions.is_empty() {
        let paragraph = Paragraph::new("  No transactions yet. Save a basket from the Predictions screen.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let visible_rows = (area.height as usize).saturating_sub(2);
    let total = transactions.len();
    let max_offset = total.saturating_sub(visible_rows);
    let scroll_offset = state
        .scroll_offset
        .get("transactions")
        .copied()
        .unwrap_or(0)
        .min(max_offset);

    let items: Vec<ListItem> = transactions
        .iter()
        .skip(scroll_offset)
        .take(visible_rows.max(1))
        .map(|t| ListItem::new(format_transaction(t)))
        .collect();
    frame.render_widget(List::new(items).block(block), area);

    if total > visible_rows {
        let mut scrollbar_state = ScrollbarState::new(max_offset).position(scroll_offset);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

/// One row: `#id  date  (n items)  item, item, ...`
pub fn format_transaction(transaction: &Transaction) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" #{:<5}", transaction.id), Style::default().fg(Color::DarkGray)),
        Span::styled(
            transaction.date.format("%Y-%m-%d %H:%M").to_string(),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(format!("  ({} items)  ", transaction.items.len())),
        Span::styled(transaction.items.join(", "), Style::default().fg(Color::White)),
    ])
}
