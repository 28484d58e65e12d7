// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                               |
// +------------+-------------------------------------+
// | Sidebar    | Main Panel                          |
// | (22 cols)  |                                     |
// +------------+-------------------------------------+
// | Help Bar (1 row)                                 |
// +--------------------------------------------------+
//
// Login and register screens have no sidebar; the main panel spans the
// full width.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Width of the navigation sidebar in columns.
pub const SIDEBAR_WIDTH: u16 = 22;

/// Resolved screen areas.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Top row: app name, server status, signed-in user.
    pub status_bar: Rect,
    /// Navigation list, absent on public screens.
    pub sidebar: Option<Rect>,
    pub main_panel: Rect,
    /// Bottom row: keyboard shortcut hints.
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect, with_sidebar: bool) -> AppLayout {
    // Vertical: status(1) | middle(fill) | help(1)
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(5),    // middle section
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let status_bar = vertical[0];
    let middle = vertical[1];
    let help_bar = vertical[2];

    let (sidebar, main_panel) = if with_sidebar {
        let horizontal = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(middle);
        (Some(horizontal[0]), horizontal[1])
    } else {
        (None, middle)
    };

    AppLayout {
        status_bar,
        sidebar,
        main_panel,
        help_bar,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
