// Status bar widget: app name, server health, signed-in user.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::protocol::ServerStatus;
use crate::tui::ViewState;
use smartbasket_core::session::SessionState;

/// Render the status bar into the given area.
///
/// Layout: [app name] [server indicator] | [user]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = vec![Span::styled(
        " SmartBasket ",
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )];

    let (dot, dot_color, label) = server_indicator(&state.snapshot.server_status);
    spans.push(Span::styled(format!("{} ", dot), Style::default().fg(dot_color)));
    spans.push(Span::styled(label, Style::default().fg(Color::White)));

    spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
    spans.push(Span::styled(
        user_label(&state.snapshot.session),
        Style::default().fg(Color::White),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the server dot character, its color, and a short label.
pub fn server_indicator(status: &ServerStatus) -> (&'static str, Color, String) {
    match status {
        ServerStatus::Unknown => ("●", Color::DarkGray, "Checking server".to_string()),
        ServerStatus::Online { version: Some(v) } => ("●", Color::Green, format!("API v{}", v)),
        ServerStatus::Online { version: None } => ("●", Color::Green, "API online".to_string()),
        ServerStatus::Offline => ("●", Color::Red, "API offline".to_string()),
    }
}

fn user_label(session: &SessionState) -> String {
    match session {
        SessionState::Authenticated(user) => format!("Logged in as {}", user.username),
        SessionState::Anonymous => "Not logged in".to_string(),
        SessionState::Unknown => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::widgets::render_text;
    use smartbasket_core::models::{Role, User};

    #[test]
    fn server_indicator_colors() {
        assert_eq!(server_indicator(&ServerStatus::Offline).1, Color::Red);
        assert_eq!(server_indicator(&ServerStatus::Unknown).1, Color::DarkGray);
        let (_, color, label) = server_indicator(&ServerStatus::Online {
            version: Some("1.2.0".into()),
        });
        assert_eq!(color, Color::Green);
        assert_eq!(label, "API v1.2.0");
    }

    #[test]
    fn shows_signed_in_user() {
        let mut state = ViewState::default();
        state.snapshot.session = SessionState::Authenticated(User {
            id: 3,
            username: "ana".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            is_active: true,
            created_at: None,
        });
        let text = render_text(80, 1, |f| render(f, f.area(), &state));
        assert!(text.contains("SmartBasket"));
        assert!(text.contains("Logged in as ana"));
    }

    #[test]
    fn anonymous_user_label() {
        assert_eq!(user_label(&SessionState::Anonymous), "Not logged in");
        assert_eq!(user_label(&SessionState::Unknown), "");
    }
}
