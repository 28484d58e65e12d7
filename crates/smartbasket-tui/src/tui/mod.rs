// Terminal UI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` holding the latest `AppSnapshot` plus purely
// local state (form contents, cursors, toasts). The app orchestrator pushes
// `UiUpdate` messages over an mpsc channel; the TUI applies them to
// `ViewState` and re-renders at ~30 fps.

pub mod form;
pub mod input;
pub mod layout;
pub mod widgets;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::protocol::{AppSnapshot, Notification, UiUpdate, UserCommand};
use crate::router::{self, Access, Route};

use form::FormState;
use layout::{build_layout, AppLayout};

/// How long a toast stays on screen unless configured otherwise.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(4);

// ---------------------------------------------------------------------------
// Local view types
// ---------------------------------------------------------------------------

/// Which panel of the predictions screen has the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionFocus {
    Basket,
    Results,
    History,
}

impl PredictionFocus {
    pub fn next(self) -> Self {
        match self {
            PredictionFocus::Basket => PredictionFocus::Results,
            PredictionFocus::Results => PredictionFocus::History,
            PredictionFocus::History => PredictionFocus::Basket,
        }
    }
}

/// What a single-line text input is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    /// New basket item. Stays open after each submit for quick entry.
    Item,
    Feedback { prediction_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub target: InputTarget,
    pub text: String,
}

impl LineInput {
    pub fn new(target: InputTarget) -> Self {
        LineInput {
            target,
            text: String::new(),
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self.target {
            InputTarget::Item => "Add item",
            InputTarget::Feedback { .. } => "Feedback",
        }
    }
}

/// A notification with its expiry time.
#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub expires_at: Instant,
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state that mirrors the application state for rendering.
///
/// Updated via `UiUpdate` messages from the app orchestrator. The
/// `render_frame` function reads this struct to draw the screen.
pub struct ViewState {
    /// Latest state pushed by the app.
    pub snapshot: AppSnapshot,
    pub login_form: FormState,
    pub register_form: FormState,
    /// Open while the admin is filling in a new deployment.
    pub deploy_form: Option<FormState>,
    /// Open single-line input on the predictions screen.
    pub input: Option<LineInput>,
    pub focus: PredictionFocus,
    pub basket_cursor: usize,
    pub result_cursor: usize,
    pub history_cursor: usize,
    /// Per-widget scroll offsets (keyed by widget name).
    pub scroll_offset: HashMap<String, usize>,
    /// Height of the main panel in the last drawn frame; bounds scrolling.
    pub main_panel_rows: usize,
    /// Visible toasts, oldest first.
    pub notifications: Vec<Toast>,
    pub toast_duration: Duration,
    /// Whether the quit confirmation dialog is showing.
    pub confirm_quit: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            snapshot: AppSnapshot::default(),
            login_form: FormState::login(),
            register_form: FormState::register(),
            deploy_form: None,
            input: None,
            focus: PredictionFocus::Basket,
            basket_cursor: 0,
            result_cursor: 0,
            history_cursor: 0,
            scroll_offset: HashMap::new(),
            main_panel_rows: 0,
            notifications: Vec::new(),
            toast_duration: DEFAULT_TOAST_DURATION,
            confirm_quit: false,
        }
    }
}

impl ViewState {
    pub fn with_toast_duration(toast_duration: Duration) -> Self {
        ViewState {
            toast_duration,
            ..ViewState::default()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot.session.is_admin()
    }

    /// Apply a full state snapshot from the app orchestrator.
    ///
    /// Leaving a screen discards its local state (forms, inputs, cursors).
    pub fn apply_snapshot(&mut self, snapshot: AppSnapshot) {
        if snapshot.route != self.snapshot.route {
            self.login_form = FormState::login();
            self.register_form = FormState::register();
            self.deploy_form = None;
            self.input = None;
            self.focus = PredictionFocus::Basket;
            self.basket_cursor = 0;
            self.result_cursor = 0;
            self.history_cursor = 0;
            self.scroll_offset.clear();
        }
        self.snapshot = snapshot;

        self.basket_cursor = clamp_cursor(self.basket_cursor, self.snapshot.basket.len());
        let results = self
            .snapshot
            .prediction
            .as_ref()
            .map_or(0, |p| p.predicted_items.len());
        self.result_cursor = clamp_cursor(self.result_cursor, results);
        self.history_cursor = clamp_cursor(self.history_cursor, self.snapshot.history.len());
    }

    pub fn push_notification(&mut self, notification: Notification, now: Instant) {
        self.notifications.push(Toast {
            notification,
            expires_at: now + self.toast_duration,
        });
    }

    pub fn prune_notifications(&mut self, now: Instant) {
        self.notifications.retain(|t| t.expires_at > now);
    }

    /// The form shown on the current screen, if it is a login/register screen.
    pub fn auth_form_mut(&mut self) -> Option<&mut FormState> {
        match self.snapshot.route {
            Route::Login => Some(&mut self.login_form),
            Route::Register => Some(&mut self.register_form),
            _ => None,
        }
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
fn apply_ui_update(state: &mut ViewState, update: UiUpdate, now: Instant) {
    match update {
        UiUpdate::Snapshot(snapshot) => {
            state.apply_snapshot(*snapshot);
        }
        UiUpdate::Notify(notification) => {
            state.push_notification(notification, now);
        }
        UiUpdate::FormError(message) => match state.auth_form_mut() {
            Some(form) => form.error = Some(message),
            None => state.push_notification(Notification::error(message), now),
        },
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame.
fn render_frame(frame: &mut Frame, state: &ViewState) {
    let route = state.snapshot.route;
    let with_sidebar = !route.is_public() && state.snapshot.session.is_authenticated();
    let layout = build_layout(frame.area(), with_sidebar);

    widgets::status_bar::render(frame, layout.status_bar, state);
    if let Some(area) = layout.sidebar {
        widgets::sidebar::render(frame, area, state);
    }
    render_main_panel(frame, &layout, state);
    render_help_bar(frame, &layout, state);

    widgets::notifications::render(frame, frame.area(), &state.notifications);
    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

fn render_main_panel(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let area = layout.main_panel;
    let route = state.snapshot.route;
    if router::check_access(route, &state.snapshot.session) == Access::Pending {
        widgets::loading::render(frame, area);
        return;
    }
    match route {
        Route::Login => widgets::auth::render_login(frame, area, &state.login_form),
        Route::Register => widgets::auth::render_register(frame, area, &state.register_form),
        Route::Dashboard => widgets::dashboard::render(frame, area, state),
        Route::Profile => widgets::profile::render(frame, area, state),
        Route::Predictions => widgets::predictions::render(frame, area, state),
        Route::Transactions => widgets::transactions::render(frame, area, state),
        Route::Settings => widgets::settings::render(frame, area, state),
        Route::AdminModels => widgets::admin_models::render(frame, area, state),
    }
}

/// Shortcut hints for the current screen.
pub fn help_text(state: &ViewState) -> &'static str {
    if state.input.is_some() {
        return " Enter:Submit | Esc:Close";
    }
    if state.deploy_form.is_some() {
        return " Tab:Next field | Enter:Deploy | Esc:Cancel";
    }
    match state.snapshot.route {
        Route::Login => " Tab:Next field | Enter:Login | Ctrl+N:Register | Ctrl+C:Quit",
        Route::Register => " Tab:Next field | Enter:Register | Esc:Back to login | Ctrl+C:Quit",
        Route::Predictions => {
            " a:Add | d:Remove | c:Clear | p:Predict | Enter:Accept | h:History | f:Feedback | s:Save | Tab:Panel | q:Quit"
        }
        Route::Transactions => " 1-6:Navigate | r:Reload | j/k:Scroll | l:Logout | q:Quit",
        Route::AdminModels => " 1-6:Navigate | r:Reload | n:New deployment | l:Logout | q:Quit",
        Route::Profile => " 1-6:Navigate | r:Refresh | l:Logout | q:Quit",
        Route::Dashboard | Route::Settings => " 1-6:Navigate | l:Logout | q:Quit",
    }
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        help_text(state),
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (enters raw mode, enables alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on clean exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
    toast_duration: Duration,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::with_toast_duration(toast_duration);
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            // UI updates from the app orchestrator
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => {
                        apply_ui_update(&mut view_state, ui_update, Instant::now());
                    }
                    None => {
                        // Channel closed: app is shutting down
                        break;
                    }
                }
            }

            // Keyboard input
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {
                        // Mouse and resize events need no handling; the next
                        // render tick picks up the new size.
                    }
                    Some(Err(_)) | None => {
                        break;
                    }
                }
            }

            // Render tick
            _ = render_tick.tick() => {
                view_state.prune_notifications(Instant::now());
                let completed = terminal.draw(|frame| render_frame(frame, &view_state))?;
                view_state.main_panel_rows = build_layout(completed.area, true).main_panel.height as usize;
            }
        }
    }

    ratatui::restore();

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
