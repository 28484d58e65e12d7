// Message types passed between the TUI, the app orchestrator and the
// background request tasks.
//
//   TUI --UserCommand--> app --spawn--> request task --ApiEvent--> app
//   app --UiUpdate--> TUI

use smartbasket_core::api::ApiError;
use smartbasket_core::models::{
    Credentials, HealthStatus, ModelDeployment, NewDeployment, Prediction, Transaction, User,
};
use smartbasket_core::session::{RegisterForm, SessionState};

use crate::router::Route;

// ---------------------------------------------------------------------------
// TUI -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Navigate(Route),
    Login(Credentials),
    Register(RegisterForm),
    Logout,
    RefreshUser,
    AddItem(String),
    RemoveItem(usize),
    ClearBasket,
    Predict,
    /// Append the n-th item of the displayed prediction to the basket.
    AcceptPrediction(usize),
    LoadHistory,
    SubmitFeedback {
        prediction_id: i64,
        feedback: String,
    },
    LoadTransactions,
    SaveBasket,
    LoadModels,
    DeployModel(NewDeployment),
    Quit,
}

// ---------------------------------------------------------------------------
// app -> TUI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Snapshot(Box<AppSnapshot>),
    Notify(Notification),
    /// Inline error for the login/register form currently shown.
    FormError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient toast message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Reachability of the API server as seen by the periodic health check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerStatus {
    #[default]
    Unknown,
    Online {
        version: Option<String>,
    },
    Offline,
}

/// Read-only settings shown on the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsInfo {
    pub api_url: String,
    pub storage_path: String,
    pub history_limit: u32,
}

/// Everything the TUI needs to draw a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSnapshot {
    pub session: SessionState,
    /// Route after guards were applied.
    pub route: Route,
    pub basket: Vec<String>,
    pub prediction: Option<Prediction>,
    /// Newest first.
    pub history: Vec<Prediction>,
    pub predicting: bool,
    pub transactions: Vec<Transaction>,
    pub models: Vec<ModelDeployment>,
    pub server_status: ServerStatus,
    pub settings: SettingsInfo,
}

impl Default for AppSnapshot {
    fn default() -> Self {
        AppSnapshot {
            session: SessionState::Unknown,
            route: Route::Dashboard,
            basket: Vec::new(),
            prediction: None,
            history: Vec::new(),
            predicting: false,
            transactions: Vec::new(),
            models: Vec::new(),
            server_status: ServerStatus::Unknown,
            settings: SettingsInfo::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// request task -> app
// ---------------------------------------------------------------------------

/// Result of a background request, tagged with the session generation and
/// the prediction page visit it was issued under.
#[derive(Debug)]
pub struct ApiEvent {
    pub generation: u64,
    pub page_visit: u64,
    pub outcome: ApiOutcome,
}

impl ApiOutcome {
    /// Results that belong to the prediction page's local state.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            ApiOutcome::Predicted(_)
                | ApiOutcome::HistoryLoaded(_)
                | ApiOutcome::FeedbackSubmitted { .. }
        )
    }
}

#[derive(Debug)]
pub enum ApiOutcome {
    Restored(Result<User, ApiError>),
    LoggedIn(Result<(String, User), ApiError>),
    Registered(Result<(String, User), ApiError>),
    UserRefreshed(Result<User, ApiError>),
    Predicted(Result<Prediction, ApiError>),
    HistoryLoaded(Result<Vec<Prediction>, ApiError>),
    FeedbackSubmitted {
        prediction_id: i64,
        feedback: String,
        result: Result<(), ApiError>,
    },
    TransactionsLoaded(Result<Vec<Transaction>, ApiError>),
    TransactionSaved(Result<Transaction, ApiError>),
    ModelsLoaded(Result<Vec<ModelDeployment>, ApiError>),
    ModelDeployed(Result<ModelDeployment, ApiError>),
    /// Not tied to a session; applied regardless of generation.
    Health(Result<HealthStatus, ApiError>),
}
