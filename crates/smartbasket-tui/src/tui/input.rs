// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages sent to the
// app orchestrator, or into local ViewState mutations (form typing, cursor
// movement, opening inputs).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::protocol::UserCommand;
use crate::router::{self, Access, Route};
use super::form::FormState;
use super::{InputTarget, LineInput, PredictionFocus, ViewState};

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app orchestrator. Returns `None` when the key press was handled locally
/// by mutating `ViewState`.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Only process key press events. On Windows, crossterm emits both
    // Press and Release events for each physical keypress.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    // Ctrl+C always quits immediately regardless of mode (escape hatch)
    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    let route = view_state.snapshot.route;
    match route {
        Route::Login | Route::Register => return handle_auth_form(key_event, view_state, route),
        _ => {}
    }

    // Nothing to interact with until the session check completes.
    if router::check_access(route, &view_state.snapshot.session) == Access::Pending {
        if key_event.code == KeyCode::Char('q') {
            view_state.confirm_quit = true;
        }
        return None;
    }

    if view_state.input.is_some() {
        return handle_line_input(key_event, view_state);
    }
    if view_state.deploy_form.is_some() {
        return handle_deploy_form(key_event, view_state);
    }

    // Global keys
    match key_event.code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            return Route::from_sidebar_key(c, view_state.is_admin()).map(UserCommand::Navigate);
        }
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            return None;
        }
        KeyCode::Char('l') => return Some(UserCommand::Logout),
        _ => {}
    }

    match route {
        Route::Predictions => handle_predictions_key(key_event, view_state),
        Route::Transactions => match key_event.code {
            KeyCode::Char('r') => Some(UserCommand::LoadTransactions),
            code => {
                scroll(view_state, "transactions", code);
                None
            }
        },
        Route::AdminModels => match key_event.code {
            KeyCode::Char('r') => Some(UserCommand::LoadModels),
            KeyCode::Char('n') => {
                view_state.deploy_form = Some(FormState::deploy());
                None
            }
            code => {
                scroll(view_state, "models", code);
                None
            }
        },
        Route::Profile => match key_event.code {
            KeyCode::Char('r') => Some(UserCommand::RefreshUser),
            _ => None,
        },
        _ => None,
    }
}

/// Handle key events while in quit confirmation mode.
///
/// - `y` or `q` confirms quit (sends UserCommand::Quit)
/// - `n` or `Esc` cancels (returns to normal mode)
/// - All other keys are blocked (no-op)
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

/// Login and register screens: every printable key is typed into the form.
fn handle_auth_form(
    key_event: KeyEvent,
    view_state: &mut ViewState,
    route: Route,
) -> Option<UserCommand> {
    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
    match (route, key_event.code) {
        (Route::Login, KeyCode::Char('n')) if ctrl => {
            return Some(UserCommand::Navigate(Route::Register));
        }
        (Route::Register, KeyCode::Esc) => {
            return Some(UserCommand::Navigate(Route::Login));
        }
        _ => {}
    }

    let form = match route {
        Route::Login => &mut view_state.login_form,
        _ => &mut view_state.register_form,
    };
    match key_event.code {
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Enter => {
            form.error = None;
            return Some(match route {
                Route::Login => UserCommand::Login(form.credentials()),
                _ => UserCommand::Register(form.register_form()),
            });
        }
        KeyCode::Char(c) if !ctrl => form.push_char(c),
        _ => {}
    }
    None
}

/// Single-line input on the predictions screen.
fn handle_line_input(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let input = view_state.input.as_mut()?;
    match key_event.code {
        KeyCode::Esc => {
            view_state.input = None;
            None
        }
        KeyCode::Enter => {
            let text = std::mem::take(&mut input.text);
            let target = input.target;
            match target {
                InputTarget::Item => {
                    if text.trim().is_empty() {
                        None
                    } else {
                        Some(UserCommand::AddItem(text))
                    }
                }
                InputTarget::Feedback { prediction_id } => {
                    view_state.input = None;
                    Some(UserCommand::SubmitFeedback {
                        prediction_id,
                        feedback: text,
                    })
                }
            }
        }
        KeyCode::Backspace => {
            input.text.pop();
            None
        }
        KeyCode::Char(c) => {
            input.text.push(c);
            None
        }
        _ => None,
    }
}

/// Deployment form on the admin models screen.
fn handle_deploy_form(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let form = view_state.deploy_form.as_mut()?;
    match key_event.code {
        KeyCode::Esc => view_state.deploy_form = None,
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Enter => match form.deployment() {
            Ok(deployment) => {
                view_state.deploy_form = None;
                return Some(UserCommand::DeployModel(deployment));
            }
            Err(message) => form.error = Some(message),
        },
        KeyCode::Char(c) => form.push_char(c),
        _ => {}
    }
    None
}

fn handle_predictions_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('a') | KeyCode::Char('i') => {
            view_state.input = Some(LineInput::new(InputTarget::Item));
            None
        }
        KeyCode::Tab => {
            view_state.focus = view_state.focus.next();
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            move_cursor(view_state, -1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            move_cursor(view_state, 1);
            None
        }
        KeyCode::Char('d') | KeyCode::Delete
            if view_state.focus == PredictionFocus::Basket && !view_state.snapshot.basket.is_empty() =>
        {
            Some(UserCommand::RemoveItem(view_state.basket_cursor))
        }
        KeyCode::Char('c') => Some(UserCommand::ClearBasket),
        KeyCode::Char('p') => Some(UserCommand::Predict),
        KeyCode::Enter
            if view_state.focus == PredictionFocus::Results && view_state.snapshot.prediction.is_some() =>
        {
            Some(UserCommand::AcceptPrediction(view_state.result_cursor))
        }
        KeyCode::Char('h') => Some(UserCommand::LoadHistory),
        KeyCode::Char('f') if view_state.focus == PredictionFocus::History => {
            let id = view_state
                .snapshot
                .history
                .get(view_state.history_cursor)
                .and_then(|p| p.id)?;
            view_state.input = Some(LineInput::new(InputTarget::Feedback { prediction_id: id }));
            None
        }
        KeyCode::Char('s') => Some(UserCommand::SaveBasket),
        _ => None,
    }
}

/// Move the cursor of the focused predictions panel by `delta`, staying in
/// range.
fn move_cursor(view_state: &mut ViewState, delta: isize) {
    let snapshot = &view_state.snapshot;
    let (cursor, len) = match view_state.focus {
        PredictionFocus::Basket => (&mut view_state.basket_cursor, snapshot.basket.len()),
        PredictionFocus::Results => (
            &mut view_state.result_cursor,
            snapshot.prediction.as_ref().map_or(0, |p| p.predicted_items.len()),
        ),
        PredictionFocus::History => (&mut view_state.history_cursor, snapshot.history.len()),
    };
    if len == 0 {
        *cursor = 0;
        return;
    }
    *cursor = cursor.saturating_add_signed(delta).min(len - 1);
}

/// Scroll a list widget with the usual keys.
/// The offset never passes the point where the last row sits at the bottom
/// of the panel.
fn scroll(view_state: &mut ViewState, key: &str, code: KeyCode) {
    let max = max_scroll(view_state, key);
    let offset = view_state.scroll_offset.entry(key.to_string()).or_insert(0);
    *offset = match code {
        KeyCode::Up | KeyCode::Char('k') => offset.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => offset.saturating_add(1),
        KeyCode::PageUp => offset.saturating_sub(page_size()),
        KeyCode::PageDown => offset.saturating_add(page_size()),
        _ => *offset,
    }
    .min(max);
}

/// Largest useful offset for a scrollable list: its length minus the rows
/// the main panel shows (borders, plus the header row for tables).
fn max_scroll(view_state: &ViewState, key: &str) -> usize {
    let (len, chrome) = match key {
        "transactions" => (view_state.snapshot.transactions.len(), 2),
        "models" => (view_state.snapshot.models.len(), 3),
        _ => (0, 0),
    };
    len.saturating_sub(view_state.main_panel_rows.saturating_sub(chrome))
}

/// Page size for PageUp/PageDown scrolling.
fn page_size() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
