// Admin: model deployments table and the new-deployment dialog.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use ratatui::Frame;

use smartbasket_core::models::ModelDeployment;

use crate::tui::ViewState;
use super::auth::form_lines;
use super::quit_confirm::centered_rect;

const DIALOG_WIDTH: u16 = 50;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let models = &state.snapshot.models;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Model Deployments ({})", models.len()));

    if models.is_empty() {
        frame.render_widget(
            Paragraph::new("  No deployments recorded. Press 'n' to deploy a model.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
    } else {
        // Header row plus borders.
        let visible_rows = (area.height as usize).saturating_sub(3);
        let scroll_offset = state
            .scroll_offset
            .get("models")
            .copied()
            .unwrap_or(0)
            .min(models.len().saturating_sub(visible_rows));

        let header = Row::new(["Version", "Deployed", "By", "Status", "Accuracy"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = models
            .iter()
            .skip(scroll_offset)
            .take(visible_rows.max(1))
            .map(model_row)
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Min(12),
                Constraint::Length(17),
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(9),
            ],
        )
        .header(header)
        .block(block);
        frame.render_widget(table, area);
    }

    if let Some(form) = &state.deploy_form {
        let lines = form_lines(form, "Enter: deploy   Esc: cancel");
        let rect = centered_rect(DIALOG_WIDTH, lines.len() as u16 + 2, area);
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Deploy Model "),
            ),
            rect,
        );
    }
}

fn model_row(model: &ModelDeployment) -> Row<'static> {
    let status_color = if model.status.eq_ignore_ascii_case("active") {
        Color::Green
    } else {
        Color::Gray
    };
    Row::new(vec![
        Cell::from(model.model_version.clone()),
        Cell::from(model.deployment_time.format("%Y-%m-%d %H:%M").to_string()),
        Cell::from(format!("#{}", model.deployed_by)),
        Cell::from(model.status.clone()).style(Style::default().fg(status_color)),
        Cell::from(format_accuracy(model.accuracy())),
    ])
}

/// Accuracy as a percentage, or `N/A` when the metric is missing.
pub fn format_accuracy(accuracy: Option<f64>) -> String {
    match accuracy {
        Some(a) => format!("{:.1}%", a * 100.0),
        None => "N/A".to_string(),
    }
}
