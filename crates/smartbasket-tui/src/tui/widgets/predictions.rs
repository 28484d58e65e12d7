// Predictions screen: basket editor, latest prediction, and history.
//
// +----------------------+---------------------------+
// | Basket               | Predicted Next Items      |
// |  > milk              |  > bread  ████░░  60.0%   |
// | Add item: egg_       |                           |
// +----------------------+---------------------------+
// | History                                          |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use smartbasket_core::models::{Prediction, PredictionItem};

use crate::tui::{PredictionFocus, ViewState};

/// Cells in the confidence bar.
const BAR_WIDTH: usize = 10;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    render_basket(frame, top[0], state);
    render_results(frame, top[1], state);
    render_history(frame, rows[1], state);
}

fn panel(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn selected_style(selected: bool) -> Style {
    if selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    }
}

fn render_basket(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == PredictionFocus::Basket;
    let basket = &state.snapshot.basket;
    let block = panel(format!("Basket ({})", basket.len()), focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (list_area, input_area) = if state.input.is_some() && inner.height > 1 {
        let split = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).split(inner);
        (split[0], Some(split[1]))
    } else {
        (inner, None)
    };

    if basket.is_empty() {
        frame.render_widget(
            Paragraph::new("Your basket is empty. Press 'a' to add items.")
                .style(Style::default().fg(Color::DarkGray)),
            list_area,
        );
    } else {
        let visible = list_area.height as usize;
        let skip = (state.basket_cursor + 1).saturating_sub(visible);
        let items: Vec<ListItem> = basket
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, item)| {
                let selected = focused && i == state.basket_cursor;
                ListItem::new(Line::from(Span::styled(
                    format!(" {}", item),
                    selected_style(selected),
                )))
            })
            .collect();
        frame.render_widget(List::new(items), list_area);
    }

    if let (Some(input), Some(input_area)) = (&state.input, input_area) {
        let line = Line::from(vec![
            Span::styled(format!("{}: ", input.prompt()), Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}_", input.text)),
        ]);
        frame.render_widget(Paragraph::new(line), input_area);
    }
}

fn render_results(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == PredictionFocus::Results;
    let block = panel("Predicted Next Items".to_string(), focused);

    if state.snapshot.predicting {
        frame.render_widget(
            Paragraph::new("Predicting...")
                .style(Style::default().fg(Color::Yellow))
                .block(block),
            area,
        );
        return;
    }

    let Some(prediction) = &state.snapshot.prediction else {
        frame.render_widget(
            Paragraph::new("Press 'p' to predict what comes next.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    };

    let items: Vec<ListItem> = prediction
        .predicted_items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let selected = focused && i == state.result_cursor;
            ListItem::new(result_line(item, selected))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

fn result_line(item: &PredictionItem, selected: bool) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<16}", item.item), selected_style(selected)),
        Span::styled(confidence_bar(item.probability), Style::default().fg(Color::Green)),
        Span::raw(format!(" {:.1}% confidence", item.probability)),
    ])
}

/// Fixed-width bar for a 0-100 probability. Out-of-range values are clamped.
pub fn confidence_bar(probability: f64) -> String {
    let filled = ((probability.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn render_history(frame: &mut Frame, area: Rect, state: &ViewState) {
    let focused = state.focus == PredictionFocus::History;
    let history = &state.snapshot.history;
    let block = panel(format!("History ({})", history.len()), focused);

    if history.is_empty() {
        frame.render_widget(
            Paragraph::new("No predictions yet. Press 'h' to load your history.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    // Each entry takes two rows.
    let visible = (area.height as usize).saturating_sub(2) / 2;
    let skip = (state.history_cursor + 1).saturating_sub(visible.max(1));
    let items: Vec<ListItem> = history
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(i, p)| ListItem::new(history_lines(p, focused && i == state.history_cursor)))
        .collect();
    frame.render_widget(List::new(items).block(block), area);
}

pub fn history_lines(prediction: &Prediction, selected: bool) -> Vec<Line<'static>> {
    let mut header = vec![
        Span::styled(
            prediction.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            selected_style(selected).fg(Color::Gray),
        ),
        Span::raw("  Basket: "),
        Span::raw(prediction.basket.join(", ")),
    ];
    if let Some(feedback) = &prediction.feedback {
        header.push(Span::styled(
            format!("  Feedback: {}", feedback),
            Style::default().fg(Color::Cyan),
        ));
    }
    vec![
        Line::from(header),
        Line::from(vec![
            Span::styled("  Predicted: ", Style::default().fg(Color::Gray)),
            Span::styled(prediction.predicted_names(), Style::default().fg(Color::Green)),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::widgets::render_text;
    use crate::tui::{InputTarget, LineInput};

    fn prediction() -> Prediction {
        Prediction {
            id: Some(9),
            basket: vec!["milk".into(), "cereal".into()],
            predicted_items: vec![
                PredictionItem {
                    item: "bananas".into(),
                    probability: 72.5,
                },
                PredictionItem {
                    item: "bread".into(),
                    probability: 20.0,
                },
            ],
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            feedback: Some("helpful".into()),
        }
    }

    #[test]
    fn confidence_bar_scales_and_clamps() {
        assert_eq!(confidence_bar(0.0), "░".repeat(10));
        assert_eq!(confidence_bar(100.0), "█".repeat(10));
        assert_eq!(confidence_bar(150.0), "█".repeat(10));
        assert_eq!(confidence_bar(50.0).chars().filter(|c| *c == '█').count(), 5);
    }

    #[test]
    fn empty_screen_shows_placeholders() {
        let state = ViewState::default();
        let text = render_text(100, 24, |f| render(f, f.area(), &state));
        assert!(text.contains("Your basket is empty"));
        assert!(text.contains("Predicted Next Items"));
        assert!(text.contains("No predictions yet"));
    }

    #[test]
    fn shows_prediction_and_history() {
        let mut state = ViewState::default();
        state.snapshot.basket = vec!["milk".into(), "cereal".into()];
        state.snapshot.prediction = Some(prediction());
        state.snapshot.history = vec![prediction()];
        let text = render_text(120, 24, |f| render(f, f.area(), &state));
        assert!(text.contains("cereal"));
        assert!(text.contains("72.5% confidence"));
        assert!(text.contains("Basket: milk, cereal"));
        assert!(text.contains("Predicted: bananas, bread"));
        assert!(text.contains("2024-05-01 08:30"));
        assert!(text.contains("Feedback: helpful"));
    }

    #[test]
    fn shows_input_line_and_spinner() {
        let mut state = ViewState::default();
        state.snapshot.predicting = true;
        let mut input = LineInput::new(InputTarget::Item);
        input.text = "eggs".into();
        state.input = Some(input);
        let text = render_text(100, 24, |f| render(f, f.area(), &state));
        assert!(text.contains("Add item: eggs_"));
        assert!(text.contains("Predicting..."));
    }
}
