// TUI widget modules, one per screen plus shared chrome and overlays.

pub mod admin_models;
pub mod auth;
pub mod dashboard;
pub mod loading;
pub mod notifications;
pub mod predictions;
pub mod profile;
pub mod quit_confirm;
pub mod settings;
pub mod sidebar;
pub mod status_bar;
pub mod transactions;

/// Render a widget into a fresh `TestBackend` and return the screen text,
/// one line per row.
#[cfg(test)]
pub(crate) fn render_text(
    width: u16,
    height: u16,
    draw: impl FnOnce(&mut ratatui::Frame),
) -> String {
    let backend = ratatui::backend::TestBackend::new(width, height);
    let mut terminal = ratatui::Terminal::new(backend).unwrap();
    terminal.draw(draw).unwrap();
    let buffer = terminal.backend().buffer().clone();
    buffer
        .content()
        .chunks(width as usize)
        .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
