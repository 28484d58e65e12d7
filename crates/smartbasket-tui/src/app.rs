// Application state and orchestration logic.
//
// The central event loop that owns all client state: session, basket,
// predictions, history, transactions and model deployments. User commands
// arrive from the TUI; every REST call runs in its own spawned task and
// reports back through the API event channel. After each change a fresh
// snapshot is pushed to the TUI render loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smartbasket_core::api::{ApiError, BasketApi};
use smartbasket_core::basket::Basket;
use smartbasket_core::config::Config;
use smartbasket_core::models::{
    Credentials, HealthStatus, ModelDeployment, NewDeployment, NewTransaction, Prediction,
    Transaction, User,
};
use smartbasket_core::session::{self, RegisterForm, Session};

use crate::protocol::{
    ApiEvent, ApiOutcome, AppSnapshot, Notification, ServerStatus, SettingsInfo, UiUpdate,
    UserCommand,
};
use crate::router::{self, Access, Route};

/// Warning shown when predicting with nothing in the basket.
pub const EMPTY_BASKET_WARNING: &str = "Please add at least one item to your basket";

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete client state.
pub struct AppState {
    pub config: Config,
    pub session: Session,
    /// Route the user asked for. What is shown is this route after guards
    /// (see `current_route`).
    pub route: Route,
    pub basket: Basket,
    /// Prediction currently on display, if any.
    pub prediction: Option<Prediction>,
    /// Newest first. Never persisted.
    pub history: Vec<Prediction>,
    /// A prediction request is in flight.
    pub predicting: bool,
    pub transactions: Vec<Transaction>,
    pub models: Vec<ModelDeployment>,
    pub server_status: ServerStatus,
    /// Bumped each time the user leaves the prediction page. Basket,
    /// prediction and history results from an earlier visit are dropped.
    pub page_visit: u64,
    /// Shared with spawned request tasks.
    pub api: Arc<dyn BasketApi>,
    /// Spawned request tasks send their results through a clone of this.
    pub api_tx: mpsc::Sender<ApiEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        session: Session,
        api: Arc<dyn BasketApi>,
        api_tx: mpsc::Sender<ApiEvent>,
    ) -> Self {
        AppState {
            config,
            session,
            route: Route::Dashboard,
            basket: Basket::new(),
            prediction: None,
            history: Vec::new(),
            predicting: false,
            transactions: Vec::new(),
            models: Vec::new(),
            server_status: ServerStatus::Unknown,
            page_visit: 0,
            api,
            api_tx,
        }
    }

    /// Kick off the startup work: validate a stored token (if any) and run
    /// the first health check.
    pub fn start(&mut self) {
        match self.session.begin_restore() {
            Some(token) => {
                info!("Validating stored token");
                self.spawn_request(move |api| async move {
                    ApiOutcome::Restored(api.current_user(&token).await)
                });
            }
            None => {
                self.route = router::resolve(self.route, self.session.state());
            }
        }
        self.check_health();
    }

    /// The route actually shown, after guards.
    pub fn current_route(&self) -> Route {
        router::resolve(self.route, self.session.state())
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            session: self.session.state().clone(),
            route: self.current_route(),
            basket: self.basket.items().to_vec(),
            prediction: self.prediction.clone(),
            history: self.history.clone(),
            predicting: self.predicting,
            transactions: self.transactions.clone(),
            models: self.models.clone(),
            server_status: self.server_status.clone(),
            settings: SettingsInfo {
                api_url: self.config.api.base_url.clone(),
                storage_path: self.config.storage_path.display().to_string(),
                history_limit: self.config.predictions.history_limit,
            },
        }
    }

    /// Spawn a background request. The closure receives a handle to the API
    /// and returns the future to run; its outcome comes back as an
    /// `ApiEvent` tagged with the current session generation and page
    /// visit.
    fn spawn_request<F, Fut>(&self, request: F)
    where
        F: FnOnce(Arc<dyn BasketApi>) -> Fut,
        Fut: Future<Output = ApiOutcome> + Send + 'static,
    {
        let future = request(Arc::clone(&self.api));
        let tx = self.api_tx.clone();
        let generation = self.session.generation();
        let page_visit = self.page_visit;
        tokio::spawn(async move {
            let outcome = future.await;
            let event = ApiEvent {
                generation,
                page_visit,
                outcome,
            };
            if tx.send(event).await.is_err() {
                debug!("API event channel closed, dropping result");
            }
        });
    }

    /// Token for an authenticated request. `None` (with a log line) when the
    /// session has no token, in which case the request is skipped.
    fn auth_token(&self, operation: &str) -> Option<String> {
        if !self.session.state().is_authenticated() {
            debug!("Skipping {} request: not signed in", operation);
            return None;
        }
        let token = self.session.token();
        if token.is_none() {
            warn!("Skipping {} request: no stored token", operation);
        }
        token
    }

    /// Forget everything tied to the previous user.
    fn reset_user_data(&mut self) {
        self.basket.clear();
        self.prediction = None;
        self.history.clear();
        self.predicting = false;
        self.transactions.clear();
        self.models.clear();
    }

    // -- Navigation --

    pub fn navigate(&mut self, route: Route) {
        let previous = self.current_route();
        self.route = route;
        let shown = self.current_route();
        if shown != route {
            info!("Route {:?} redirected to {:?}", route, shown);
            self.route = shown;
        }
        if previous == Route::Predictions && shown != Route::Predictions {
            self.leave_prediction_page();
        }
        self.enter_route();
    }

    /// The basket, prediction and history only live while the prediction
    /// page is shown.
    fn leave_prediction_page(&mut self) {
        debug!("Leaving prediction page, discarding basket and history");
        self.basket.clear();
        self.prediction = None;
        self.history.clear();
        self.predicting = false;
        self.page_visit += 1;
    }

    /// Fetch the data a screen shows on every visit.
    fn enter_route(&mut self) {
        if router::check_access(self.route, self.session.state()) != Access::Granted {
            return;
        }
        match self.route {
            Route::Transactions => self.request_transactions(),
            Route::AdminModels => self.request_models(),
            _ => {}
        }
    }

    // -- Session --

    pub fn login(&mut self, credentials: Credentials) -> Result<(), String> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err("Username and password are required".to_string());
        }
        info!("Logging in as {}", credentials.username);
        self.spawn_request(move |api| async move {
            ApiOutcome::LoggedIn(session::authenticate(api.as_ref(), &credentials).await)
        });
        Ok(())
    }

    pub fn register(&mut self, form: RegisterForm) -> Result<(), String> {
        let new_user = form.validate().map_err(|e| e.to_string())?;
        info!("Registering {}", new_user.username);
        self.spawn_request(move |api| async move {
            ApiOutcome::Registered(session::register_account(api.as_ref(), &new_user).await)
        });
        Ok(())
    }

    pub fn logout(&mut self) {
        info!("Logging out");
        self.session.logout();
        self.reset_user_data();
        self.route = Route::Login;
    }

    pub fn refresh_user(&mut self) {
        if let Some(token) = self.auth_token("refresh user") {
            self.spawn_request(move |api| async move {
                ApiOutcome::UserRefreshed(api.current_user(&token).await)
            });
        }
    }

    // -- Basket & predictions --

    pub fn add_item(&mut self, raw: &str) -> bool {
        self.basket.add(raw)
    }

    pub fn remove_item(&mut self, index: usize) {
        if self.basket.remove(index).is_none() {
            debug!("Ignoring remove of out-of-range basket index {}", index);
        }
    }

    /// Empty the basket and drop the displayed prediction.
    pub fn clear_basket(&mut self) {
        self.basket.clear();
        self.prediction = None;
    }

    /// Request a prediction for the current basket. Returns a warning to show
    /// when the basket is empty. A request already in flight makes this a
    /// no-op.
    pub fn predict(&mut self) -> Option<Notification> {
        if self.basket.is_empty() {
            return Some(Notification::warning(EMPTY_BASKET_WARNING));
        }
        if self.predicting {
            debug!("Prediction already in flight, ignoring");
            return None;
        }
        let token = self.auth_token("predict")?;
        let items = self.basket.items().to_vec();
        self.predicting = true;
        info!("Requesting prediction for {} items", items.len());
        self.spawn_request(move |api| async move {
            ApiOutcome::Predicted(api.predict_next_item(&token, &items).await)
        });
        None
    }

    /// Move the n-th predicted item into the basket and close the
    /// prediction.
    pub fn accept_prediction(&mut self, index: usize) -> bool {
        let item = self
            .prediction
            .as_ref()
            .and_then(|p| p.predicted_items.get(index))
            .map(|p| p.item.clone());
        match item {
            Some(item) => {
                self.basket.add(&item);
                self.prediction = None;
                true
            }
            None => false,
        }
    }

    pub fn load_history(&mut self) {
        if let Some(token) = self.auth_token("history") {
            let limit = self.config.predictions.history_limit;
            self.spawn_request(move |api| async move {
                ApiOutcome::HistoryLoaded(api.prediction_history(&token, limit).await)
            });
        }
    }

    pub fn submit_feedback(&mut self, prediction_id: i64, feedback: String) -> Option<Notification> {
        let feedback = feedback.trim().to_string();
        if feedback.is_empty() {
            return Some(Notification::warning("Feedback cannot be empty"));
        }
        let token = self.auth_token("feedback")?;
        self.spawn_request(move |api| async move {
            let result = api.submit_feedback(&token, prediction_id, &feedback).await;
            ApiOutcome::FeedbackSubmitted {
                prediction_id,
                feedback,
                result,
            }
        });
        None
    }

    // -- Transactions --

    pub fn request_transactions(&mut self) {
        if let Some(token) = self.auth_token("transactions") {
            self.spawn_request(move |api| async move {
                ApiOutcome::TransactionsLoaded(api.transactions(&token).await)
            });
        }
    }

    pub fn save_basket(&mut self) -> Option<Notification> {
        if self.basket.is_empty() {
            return Some(Notification::warning("Basket is empty, nothing to save"));
        }
        let token = self.auth_token("save transaction")?;
        let tx = NewTransaction {
            date: None,
            items: self.basket.items().to_vec(),
        };
        self.spawn_request(move |api| async move {
            ApiOutcome::TransactionSaved(api.create_transaction(&token, &tx).await)
        });
        None
    }

    // -- Models --

    pub fn request_models(&mut self) {
        if let Some(token) = self.auth_token("models") {
            self.spawn_request(move |api| async move {
                ApiOutcome::ModelsLoaded(api.models(&token).await)
            });
        }
    }

    pub fn deploy_model(&mut self, deployment: NewDeployment) -> Option<Notification> {
        if !self.session.state().is_admin() {
            return Some(Notification::error("Admin access required"));
        }
        if deployment.model_version.trim().is_empty() {
            return Some(Notification::warning("Model version is required"));
        }
        let token = self.auth_token("deploy model")?;
        info!("Deploying model {}", deployment.model_version);
        self.spawn_request(move |api| async move {
            ApiOutcome::ModelDeployed(api.deploy_model(&token, &deployment).await)
        });
        None
    }

    // -- Health --

    pub fn check_health(&self) {
        self.spawn_request(|api| async move { ApiOutcome::Health(api.health().await) });
    }

    fn apply_health(&mut self, result: Result<HealthStatus, ApiError>) {
        let status = match result {
            Ok(health) if health.is_healthy() => ServerStatus::Online {
                version: health.version,
            },
            Ok(health) => {
                debug!("Server reported status {:?}", health.status);
                ServerStatus::Offline
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                ServerStatus::Offline
            }
        };
        if status != self.server_status {
            info!("Server status changed: {:?} -> {:?}", self.server_status, status);
            self.server_status = status;
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on two channels and a timer using `tokio::select!`:
/// 1. User commands from the TUI
/// 2. Results of background API requests
/// 3. The periodic health check
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut api_rx: mpsc::Receiver<ApiEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    state.start();
    send_snapshot(&state, &ui_tx).await;

    let mut health_interval =
        tokio::time::interval(Duration::from_secs(state.config.ui.health_check_secs));
    // The first tick completes immediately and `start` already checked.
    health_interval.tick().await;

    loop {
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- API results ---
            event = api_rx.recv() => {
                match event {
                    Some(event) => {
                        handle_api_event(&mut state, event, &ui_tx).await;
                    }
                    None => {
                        // AppState holds a sender, so this only happens on teardown.
                        info!("API event channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Server health ---
            _ = health_interval.tick() => {
                state.check_health();
            }
        }
    }

    info!("Application event loop exiting");
    Ok(())
}

async fn send_snapshot(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let snapshot = state.build_snapshot();
    let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
}

async fn notify(ui_tx: &mpsc::Sender<UiUpdate>, notification: Notification) {
    let _ = ui_tx.send(UiUpdate::Notify(notification)).await;
}

/// Handle a user command from the TUI.
pub async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    let notification = match cmd {
        UserCommand::Navigate(route) => {
            state.navigate(route);
            None
        }
        UserCommand::Login(credentials) => {
            if let Err(message) = state.login(credentials) {
                let _ = ui_tx.send(UiUpdate::FormError(message)).await;
            }
            None
        }
        UserCommand::Register(form) => {
            if let Err(message) = state.register(form) {
                let _ = ui_tx.send(UiUpdate::FormError(message)).await;
            }
            None
        }
        UserCommand::Logout => {
            state.logout();
            Some(Notification::info("Logged out"))
        }
        UserCommand::RefreshUser => {
            state.refresh_user();
            None
        }
        UserCommand::AddItem(item) => {
            state.add_item(&item);
            None
        }
        UserCommand::RemoveItem(index) => {
            state.remove_item(index);
            None
        }
        UserCommand::ClearBasket => {
            state.clear_basket();
            None
        }
        UserCommand::Predict => state.predict(),
        UserCommand::AcceptPrediction(index) => {
            state.accept_prediction(index);
            None
        }
        UserCommand::LoadHistory => {
            state.load_history();
            None
        }
        UserCommand::SubmitFeedback {
            prediction_id,
            feedback,
        } => state.submit_feedback(prediction_id, feedback),
        UserCommand::LoadTransactions => {
            state.request_transactions();
            None
        }
        UserCommand::SaveBasket => state.save_basket(),
        UserCommand::LoadModels => {
            state.request_models();
            None
        }
        UserCommand::DeployModel(deployment) => state.deploy_model(deployment),
        UserCommand::Quit => {
            // Handled in the main loop
            None
        }
    };

    if let Some(notification) = notification {
        notify(ui_tx, notification).await;
    }
    send_snapshot(state, ui_tx).await;
}

/// Apply the result of a background request.
pub async fn handle_api_event(
    state: &mut AppState,
    event: ApiEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    // Health is not tied to a session. Everything else issued under an
    // older session generation is stale.
    let outcome = match event.outcome {
        ApiOutcome::Health(result) => {
            let before = state.server_status.clone();
            state.apply_health(result);
            if state.server_status != before {
                send_snapshot(state, ui_tx).await;
            }
            return;
        }
        outcome if event.generation != state.session.generation() => {
            debug!(
                "Discarding stale API result (event gen: {}, current gen: {}): {:?}",
                event.generation,
                state.session.generation(),
                outcome
            );
            return;
        }
        outcome if outcome.is_page_local() && event.page_visit != state.page_visit => {
            debug!(
                "Discarding result for an earlier prediction page visit: {:?}",
                outcome
            );
            return;
        }
        outcome => outcome,
    };

    let notification = match outcome {
        ApiOutcome::Restored(Ok(user)) => {
            state.session.restore_succeeded(user);
            state.route = state.current_route();
            state.enter_route();
            None
        }
        ApiOutcome::Restored(Err(e)) => {
            warn!("Stored token rejected: {}", e);
            state.session.restore_failed();
            state.route = state.current_route();
            None
        }
        ApiOutcome::LoggedIn(Ok((token, user))) => {
            let welcome = format!("Welcome back, {}!", user.username);
            sign_in(state, &token, user);
            Some(Notification::success(welcome))
        }
        ApiOutcome::Registered(Ok((token, user))) => {
            let welcome = format!("Account created. Welcome, {}!", user.username);
            sign_in(state, &token, user);
            Some(Notification::success(welcome))
        }
        ApiOutcome::LoggedIn(Err(e)) => {
            warn!("Login failed: {}", e);
            let _ = ui_tx
                .send(UiUpdate::FormError(e.user_message("Login failed")))
                .await;
            None
        }
        ApiOutcome::Registered(Err(e)) => {
            warn!("Registration failed: {}", e);
            let _ = ui_tx
                .send(UiUpdate::FormError(e.user_message("Registration failed")))
                .await;
            None
        }
        ApiOutcome::UserRefreshed(Ok(user)) => {
            state.session.user_refreshed(user);
            Some(Notification::info("Profile refreshed"))
        }
        ApiOutcome::UserRefreshed(Err(e)) => {
            warn!("User refresh failed, logging out: {}", e);
            state.logout();
            Some(Notification::error("Session expired. Please log in again."))
        }
        ApiOutcome::Predicted(Ok(prediction)) => {
            state.predicting = false;
            info!(
                "Prediction received: {}",
                prediction.predicted_names()
            );
            state.history.insert(0, prediction.clone());
            state.prediction = Some(prediction);
            Some(Notification::success("Prediction complete!"))
        }
        ApiOutcome::Predicted(Err(e)) => {
            state.predicting = false;
            warn!("Prediction failed: {}", e);
            Some(Notification::error(format!(
                "Prediction failed: {}",
                e.user_message("Failed to get prediction")
            )))
        }
        ApiOutcome::HistoryLoaded(Ok(history)) => {
            info!("Loaded {} history records", history.len());
            let message = format!("Loaded {} predictions", history.len());
            state.history = history;
            Some(Notification::info(message))
        }
        ApiOutcome::HistoryLoaded(Err(e)) => Some(Notification::error(
            e.user_message("Failed to get prediction history"),
        )),
        ApiOutcome::FeedbackSubmitted {
            prediction_id,
            feedback,
            result: Ok(()),
        } => {
            if let Some(entry) = state
                .history
                .iter_mut()
                .find(|p| p.id == Some(prediction_id))
            {
                entry.feedback = Some(feedback);
            }
            Some(Notification::success("Feedback submitted"))
        }
        ApiOutcome::FeedbackSubmitted { result: Err(e), .. } => Some(Notification::error(
            e.user_message("Failed to submit feedback"),
        )),
        ApiOutcome::TransactionsLoaded(Ok(transactions)) => {
            debug!("Loaded {} transactions", transactions.len());
            state.transactions = transactions;
            None
        }
        ApiOutcome::TransactionsLoaded(Err(e)) => {
            warn!("Error fetching transactions: {}", e);
            Some(Notification::error(e.user_message("Failed to fetch transactions")))
        }
        ApiOutcome::TransactionSaved(Ok(tx)) => {
            info!("Saved transaction {} with {} items", tx.id, tx.items.len());
            state.transactions.insert(0, tx);
            Some(Notification::success("Basket saved as transaction"))
        }
        ApiOutcome::TransactionSaved(Err(e)) => Some(Notification::error(
            e.user_message("Failed to save transaction"),
        )),
        ApiOutcome::ModelsLoaded(Ok(models)) => {
            debug!("Loaded {} model deployments", models.len());
            state.models = models;
            None
        }
        ApiOutcome::ModelsLoaded(Err(e)) => {
            warn!("Failed to fetch models: {}", e);
            Some(Notification::error(e.user_message("Failed to fetch models")))
        }
        ApiOutcome::ModelDeployed(Ok(model)) => {
            let message = format!("Model {} deployed", model.model_version);
            state.models.insert(0, model);
            Some(Notification::success(message))
        }
        ApiOutcome::ModelDeployed(Err(e)) => Some(Notification::error(
            e.user_message("Failed to deploy model"),
        )),
        ApiOutcome::Health(_) => None,
    };

    if let Some(notification) = notification {
        notify(ui_tx, notification).await;
    }
    send_snapshot(state, ui_tx).await;
}

/// Move into a fresh authenticated session on the dashboard.
fn sign_in(state: &mut AppState, token: &str, user: User) {
    state.session.login_succeeded(token, user);
    state.reset_user_data();
    state.route = Route::Dashboard;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use smartbasket_core::config::{ApiConfig, PredictionsConfig, UiConfig};
    use smartbasket_core::models::{NewUser, PredictionItem, Role, TokenResponse};
    use smartbasket_core::session::SessionState;
    use smartbasket_core::storage::{LocalStorage, TOKEN_KEY};
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::protocol::NotificationLevel;

    // -----------------------------------------------------------------------
    // Fake API
    // -----------------------------------------------------------------------

    const GOOD_TOKEN: &str = "tok-1";

    /// In-process stand-in for the REST API. Accepts the password "secret"
    /// and records every call it sees.
    struct FakeApi {
        role: Role,
        fail_predictions: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(role: Role) -> Self {
            FakeApi {
                role,
                fail_predictions: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_predictions() -> Self {
            FakeApi {
                fail_predictions: true,
                ..FakeApi::new(Role::User)
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        fn user(&self) -> User {
            User {
                id: 1,
                username: "ana".into(),
                email: "ana@example.com".into(),
                role: self.role,
                is_active: true,
                created_at: None,
            }
        }

        fn check(&self, token: &str) -> Result<(), ApiError> {
            if token == GOOD_TOKEN {
                Ok(())
            } else {
                Err(unauthorized())
            }
        }
    }

    fn unauthorized() -> ApiError {
        ApiError::Status {
            status: 401,
            detail: Some("Could not validate credentials".into()),
        }
    }

    fn prediction(id: Option<i64>, basket: &[&str]) -> Prediction {
        Prediction {
            id,
            basket: basket.iter().map(|s| s.to_string()).collect(),
            predicted_items: vec![
                PredictionItem {
                    item: "bread".into(),
                    probability: 61.5,
                },
                PredictionItem {
                    item: "eggs".into(),
                    probability: 20.0,
                },
            ],
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            feedback: None,
        }
    }

    #[async_trait]
    impl BasketApi for FakeApi {
        async fn login(&self, c: &Credentials) -> Result<TokenResponse, ApiError> {
            self.record("login");
            if c.password == "secret" {
                Ok(TokenResponse {
                    access_token: GOOD_TOKEN.into(),
                    token_type: Some("bearer".into()),
                })
            } else {
                Err(ApiError::Status {
                    status: 401,
                    detail: Some("Incorrect username or password".into()),
                })
            }
        }

        async fn register(&self, u: &NewUser) -> Result<User, ApiError> {
            self.record("register");
            let mut user = self.user();
            user.username = u.username.clone();
            Ok(user)
        }

        async fn current_user(&self, token: &str) -> Result<User, ApiError> {
            self.record("me");
            self.check(token)?;
            Ok(self.user())
        }

        async fn predict_next_item(&self, token: &str, items: &[String]) -> Result<Prediction, ApiError> {
            self.record("predict");
            self.check(token)?;
            if self.fail_predictions {
                return Err(ApiError::Status {
                    status: 500,
                    detail: Some("Model components not available".into()),
                });
            }
            let basket: Vec<&str> = items.iter().map(String::as_str).collect();
            Ok(prediction(None, &basket))
        }

        async fn prediction_history(&self, token: &str, limit: u32) -> Result<Vec<Prediction>, ApiError> {
            self.record(&format!("history:{limit}"));
            self.check(token)?;
            Ok(vec![prediction(Some(7), &["tea"])])
        }

        async fn submit_feedback(&self, token: &str, id: i64, _feedback: &str) -> Result<(), ApiError> {
            self.record(&format!("feedback:{id}"));
            self.check(token)
        }

        async fn transactions(&self, token: &str) -> Result<Vec<Transaction>, ApiError> {
            self.record("transactions");
            self.check(token)?;
            Ok(vec![Transaction {
                id: 3,
                user_id: 1,
                date: chrono::NaiveDate::from_ymd_opt(2024, 2, 2)
                    .unwrap()
                    .and_hms_opt(10, 0, 0)
                    .unwrap(),
                items: vec!["tea".into(), "milk".into()],
            }])
        }

        async fn create_transaction(&self, token: &str, tx: &NewTransaction) -> Result<Transaction, ApiError> {
            self.record("create_transaction");
            self.check(token)?;
            Ok(Transaction {
                id: 4,
                user_id: 1,
                date: chrono::NaiveDate::from_ymd_opt(2024, 2, 3)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                items: tx.items.clone(),
            })
        }

        async fn models(&self, token: &str) -> Result<Vec<ModelDeployment>, ApiError> {
            self.record("models");
            self.check(token)?;
            Ok(Vec::new())
        }

        async fn deploy_model(&self, token: &str, d: &NewDeployment) -> Result<ModelDeployment, ApiError> {
            self.record("deploy");
            self.check(token)?;
            Ok(ModelDeployment {
                id: 9,
                model_version: d.model_version.clone(),
                deployed_by: 1,
                deployment_time: chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                status: "successful".into(),
                metrics: d.metrics.clone(),
            })
        }

        async fn health(&self) -> Result<HealthStatus, ApiError> {
            self.record("health");
            Ok(HealthStatus {
                status: "healthy".into(),
                version: Some("1.0.0".into()),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn test_config() -> Config {
        Config {
            api: ApiConfig {
                base_url: "http://localhost:8000/api/v1".into(),
            },
            predictions: PredictionsConfig::default(),
            ui: UiConfig::default(),
            storage_path: PathBuf::from(":memory:"),
        }
    }

    struct Harness {
        state: AppState,
        api: Arc<FakeApi>,
        api_rx: mpsc::Receiver<ApiEvent>,
        ui_tx: mpsc::Sender<UiUpdate>,
        ui_rx: mpsc::Receiver<UiUpdate>,
    }

    impl Harness {
        fn with_api(api: FakeApi, stored_token: Option<&str>) -> Self {
            let storage = LocalStorage::in_memory().unwrap();
            if let Some(token) = stored_token {
                storage.set_item(TOKEN_KEY, token).unwrap();
            }
            let api = Arc::new(api);
            let (api_tx, api_rx) = mpsc::channel(64);
            let (ui_tx, ui_rx) = mpsc::channel(256);
            let state = AppState::new(
                test_config(),
                Session::new(storage),
                Arc::clone(&api) as Arc<dyn BasketApi>,
                api_tx,
            );
            Harness {
                state,
                api,
                api_rx,
                ui_tx,
                ui_rx,
            }
        }

        async fn command(&mut self, cmd: UserCommand) {
            handle_user_command(&mut self.state, cmd, &self.ui_tx).await;
        }

        /// Apply the next API result, skipping health checks.
        async fn settle(&mut self) {
            loop {
                let event = self.api_rx.recv().await.unwrap();
                let is_health = matches!(event.outcome, ApiOutcome::Health(_));
                handle_api_event(&mut self.state, event, &self.ui_tx).await;
                if !is_health {
                    return;
                }
            }
        }

        /// Start the app anonymous (no stored token).
        async fn anonymous(role: Role) -> Self {
            let mut h = Harness::with_api(FakeApi::new(role), None);
            h.state.start();
            h
        }

        /// Start anonymous, then log in through the command path.
        async fn signed_in(api: FakeApi) -> Self {
            let mut h = Harness::with_api(api, None);
            h.state.start();
            h.command(UserCommand::Login(Credentials {
                username: "ana".into(),
                password: "secret".into(),
            }))
            .await;
            h.settle().await;
            h.drain_ui();
            h
        }

        fn drain_ui(&mut self) -> Vec<UiUpdate> {
            let mut updates = Vec::new();
            while let Ok(update) = self.ui_rx.try_recv() {
                updates.push(update);
            }
            updates
        }

        fn notifications(&mut self) -> Vec<Notification> {
            self.drain_ui()
                .into_iter()
                .filter_map(|u| match u {
                    UiUpdate::Notify(n) => Some(n),
                    _ => None,
                })
                .collect()
        }
    }

    // -----------------------------------------------------------------------
    // Tests: session and routing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn anonymous_visit_to_protected_route_redirects_to_login() {
        let mut h = Harness::anonymous(Role::User).await;
        for route in [
            Route::Dashboard,
            Route::Profile,
            Route::Predictions,
            Route::Transactions,
            Route::Settings,
            Route::AdminModels,
        ] {
            h.command(UserCommand::Navigate(route)).await;
            assert_eq!(h.state.build_snapshot().route, Route::Login, "{route:?}");
        }
        assert_eq!(h.api.count("transactions"), 0);
        assert_eq!(h.api.count("models"), 0);
    }

    #[tokio::test]
    async fn login_lands_on_dashboard() {
        let h = Harness::signed_in(FakeApi::new(Role::User)).await;
        assert!(h.state.session.state().is_authenticated());
        assert_eq!(h.state.current_route(), Route::Dashboard);
        assert_eq!(h.state.session.token().as_deref(), Some(GOOD_TOKEN));
    }

    #[tokio::test]
    async fn admin_route_reachable_only_for_admins() {
        let mut user = Harness::signed_in(FakeApi::new(Role::User)).await;
        user.command(UserCommand::Navigate(Route::AdminModels)).await;
        assert_eq!(user.state.current_route(), Route::Dashboard);
        assert_eq!(user.api.count("models"), 0);

        let mut admin = Harness::signed_in(FakeApi::new(Role::Admin)).await;
        admin.command(UserCommand::Navigate(Route::AdminModels)).await;
        assert_eq!(admin.state.current_route(), Route::AdminModels);
        admin.settle().await;
        assert_eq!(admin.api.count("models"), 1);
    }

    #[tokio::test]
    async fn failed_login_reports_form_error() {
        let mut h = Harness::anonymous(Role::User).await;
        h.command(UserCommand::Login(Credentials {
            username: "ana".into(),
            password: "nope".into(),
        }))
        .await;
        h.settle().await;

        let errors: Vec<String> = h
            .drain_ui()
            .into_iter()
            .filter_map(|u| match u {
                UiUpdate::FormError(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec!["Incorrect username or password".to_string()]);
        assert_eq!(h.state.session.state(), &SessionState::Anonymous);
        assert_eq!(h.state.session.token(), None);
    }

    #[tokio::test]
    async fn blank_login_is_rejected_locally() {
        let mut h = Harness::anonymous(Role::User).await;
        h.command(UserCommand::Login(Credentials::default())).await;
        assert!(h
            .drain_ui()
            .iter()
            .any(|u| matches!(u, UiUpdate::FormError(_))));
        assert_eq!(h.api.count("login"), 0);
    }

    #[tokio::test]
    async fn register_mismatched_passwords_never_hits_api() {
        let mut h = Harness::anonymous(Role::User).await;
        h.command(UserCommand::Register(RegisterForm {
            username: "bo".into(),
            email: "bo@example.com".into(),
            password: "secret".into(),
            confirm_password: "secrat".into(),
        }))
        .await;
        let updates = h.drain_ui();
        assert!(updates.contains(&UiUpdate::FormError("Passwords don't match".into())));
        assert_eq!(h.api.count("register"), 0);
    }

    #[tokio::test]
    async fn register_then_login_lands_on_dashboard() {
        let mut h = Harness::anonymous(Role::User).await;
        h.command(UserCommand::Register(RegisterForm {
            username: "bo".into(),
            email: "bo@example.com".into(),
            password: "secret".into(),
            confirm_password: "secret".into(),
        }))
        .await;
        h.settle().await;
        assert!(h.state.session.state().is_authenticated());
        assert_eq!(h.state.current_route(), Route::Dashboard);
        assert_eq!(h.api.count("register"), 1);
        assert_eq!(h.api.count("login"), 1);
    }

    #[tokio::test]
    async fn stored_token_restores_session() {
        let mut h = Harness::with_api(FakeApi::new(Role::User), Some(GOOD_TOKEN));
        h.state.start();
        assert_eq!(h.state.session.state(), &SessionState::Unknown);
        h.settle().await;
        assert!(h.state.session.state().is_authenticated());
        assert_eq!(h.state.current_route(), Route::Dashboard);
    }

    #[tokio::test]
    async fn rejected_stored_token_is_cleared() {
        let mut h = Harness::with_api(FakeApi::new(Role::User), Some("expired"));
        h.state.start();
        h.settle().await;
        assert_eq!(h.state.session.state(), &SessionState::Anonymous);
        assert_eq!(h.state.session.token(), None);
        assert_eq!(h.state.current_route(), Route::Login);
    }

    #[tokio::test]
    async fn logout_clears_token_and_guards_routes_again() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Logout).await;

        assert_eq!(h.state.session.token(), None);
        assert_eq!(h.state.current_route(), Route::Login);

        h.command(UserCommand::Navigate(Route::Predictions)).await;
        assert_eq!(h.state.current_route(), Route::Login);
    }

    #[tokio::test]
    async fn results_from_previous_session_are_discarded() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.add_item("milk");
        h.command(UserCommand::Predict).await;
        // Logout before the prediction result is applied.
        h.command(UserCommand::Logout).await;
        h.settle().await;

        assert!(h.state.prediction.is_none());
        assert!(h.state.history.is_empty());
        assert!(!h.state.predicting);
    }

    #[tokio::test]
    async fn failed_refresh_logs_out() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        // Swap the stored token for one the server rejects.
        h.state.session.login_succeeded("revoked", h.api.user());
        h.command(UserCommand::RefreshUser).await;
        h.settle().await;

        assert_eq!(h.state.session.state(), &SessionState::Anonymous);
        assert_eq!(h.state.current_route(), Route::Login);
        let notes = h.notifications();
        assert!(notes.iter().any(|n| n.level == NotificationLevel::Error));
    }

    // -----------------------------------------------------------------------
    // Tests: basket and predictions
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn adding_an_item_populates_the_basket() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        assert!(h.state.build_snapshot().basket.is_empty());

        h.command(UserCommand::AddItem("  milk ".into())).await;
        h.command(UserCommand::AddItem("   ".into())).await;
        assert_eq!(h.state.build_snapshot().basket, vec!["milk".to_string()]);
    }

    #[tokio::test]
    async fn empty_basket_predict_warns_without_request() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Predict).await;

        let notes = h.notifications();
        assert_eq!(notes, vec![Notification::warning(EMPTY_BASKET_WARNING)]);
        assert!(!h.state.predicting);
        assert_eq!(h.api.count("predict"), 0);
    }

    #[tokio::test]
    async fn successful_prediction_is_shown_and_prepended_to_history() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.history.push(prediction(Some(1), &["old"]));
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Predict).await;
        assert!(h.state.predicting);
        h.settle().await;

        assert!(!h.state.predicting);
        let shown = h.state.prediction.as_ref().unwrap();
        assert_eq!(shown.basket, vec!["milk"]);
        assert_eq!(h.state.history.len(), 2);
        assert_eq!(h.state.history[0].basket, vec!["milk"]);
        assert!(h
            .notifications()
            .contains(&Notification::success("Prediction complete!")));
    }

    #[tokio::test]
    async fn predict_while_in_flight_is_ignored() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Predict).await;
        h.command(UserCommand::Predict).await;
        h.settle().await;
        // Give any (incorrect) second request a chance to land.
        tokio::task::yield_now().await;
        assert_eq!(h.api.count("predict"), 1);
    }

    #[tokio::test]
    async fn accepting_a_prediction_adds_item_and_clears_it() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Predict).await;
        h.settle().await;

        h.command(UserCommand::AcceptPrediction(1)).await;
        let snap = h.state.build_snapshot();
        assert_eq!(snap.basket, vec!["milk".to_string(), "eggs".to_string()]);
        assert!(snap.prediction.is_none());
        assert_eq!(snap.history.len(), 1);
    }

    #[tokio::test]
    async fn accept_out_of_range_changes_nothing() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.prediction = Some(prediction(None, &["milk"]));
        assert!(!h.state.accept_prediction(5));
        assert!(h.state.prediction.is_some());
        assert!(h.state.basket.is_empty());
    }

    #[tokio::test]
    async fn failed_prediction_keeps_basket_and_notifies() {
        let mut h = Harness::signed_in(FakeApi::failing_predictions()).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::AddItem("bread".into())).await;
        h.command(UserCommand::Predict).await;
        h.settle().await;

        assert_eq!(
            h.state.basket.items(),
            &["milk".to_string(), "bread".to_string()]
        );
        assert!(h.state.prediction.is_none());
        assert!(!h.state.predicting);
        let notes = h.notifications();
        assert!(
            notes.contains(&Notification::error(
                "Prediction failed: Model components not available"
            )),
            "got {notes:?}"
        );
    }

    #[tokio::test]
    async fn clear_basket_also_clears_prediction() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.add_item("milk");
        h.state.prediction = Some(prediction(None, &["milk"]));
        h.command(UserCommand::ClearBasket).await;
        assert!(h.state.basket.is_empty());
        assert!(h.state.prediction.is_none());
    }

    #[tokio::test]
    async fn leaving_prediction_page_discards_its_state() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Predict).await;
        h.settle().await;
        assert!(h.state.prediction.is_some());

        h.command(UserCommand::Navigate(Route::Dashboard)).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        let snap = h.state.build_snapshot();
        assert_eq!(snap.route, Route::Predictions);
        assert!(snap.basket.is_empty());
        assert!(snap.prediction.is_none());
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn staying_on_prediction_page_keeps_its_state() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        assert_eq!(h.state.basket.items(), &["milk".to_string()]);
    }

    #[tokio::test]
    async fn prediction_arriving_after_leaving_page_is_dropped() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        h.command(UserCommand::AddItem("milk".into())).await;
        h.command(UserCommand::Predict).await;
        // Leave and come back before the response is applied.
        h.command(UserCommand::Navigate(Route::Settings)).await;
        h.command(UserCommand::Navigate(Route::Predictions)).await;
        assert!(!h.state.predicting);
        h.drain_ui();

        h.settle().await;
        assert!(h.state.prediction.is_none());
        assert!(h.state.history.is_empty());
        assert!(h.notifications().is_empty());
        assert_eq!(h.api.count("predict"), 1);
    }

    #[tokio::test]
    async fn remove_item_by_index() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.add_item("a");
        h.state.add_item("b");
        h.command(UserCommand::RemoveItem(0)).await;
        h.command(UserCommand::RemoveItem(9)).await;
        assert_eq!(h.state.basket.items(), &["b".to_string()]);
    }

    #[tokio::test]
    async fn loaded_history_replaces_local_list() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.history.push(prediction(None, &["local"]));
        h.command(UserCommand::LoadHistory).await;
        h.settle().await;

        assert_eq!(h.api.count("history:10"), 1);
        assert_eq!(h.state.history.len(), 1);
        assert_eq!(h.state.history[0].id, Some(7));
    }

    #[tokio::test]
    async fn feedback_updates_history_entry() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.history.push(prediction(Some(7), &["tea"]));
        h.command(UserCommand::SubmitFeedback {
            prediction_id: 7,
            feedback: " useful ".into(),
        })
        .await;
        h.settle().await;

        assert_eq!(h.api.count("feedback:7"), 1);
        assert_eq!(h.state.history[0].feedback.as_deref(), Some("useful"));
    }

    #[tokio::test]
    async fn blank_feedback_is_rejected() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::SubmitFeedback {
            prediction_id: 7,
            feedback: "  ".into(),
        })
        .await;
        assert_eq!(h.notifications()[0].level, NotificationLevel::Warning);
        assert_eq!(h.api.count("feedback:7"), 0);
    }

    // -----------------------------------------------------------------------
    // Tests: transactions and models
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transactions_fetched_on_each_visit() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::Navigate(Route::Transactions)).await;
        h.settle().await;
        h.command(UserCommand::Navigate(Route::Dashboard)).await;
        h.command(UserCommand::Navigate(Route::Transactions)).await;
        h.settle().await;

        assert_eq!(h.api.count("transactions"), 2);
        assert_eq!(h.state.transactions.len(), 1);
        assert_eq!(h.state.transactions[0].items, vec!["tea", "milk"]);
    }

    #[tokio::test]
    async fn save_basket_creates_transaction() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::AddItem("apples".into())).await;
        h.command(UserCommand::SaveBasket).await;
        h.settle().await;

        assert_eq!(h.api.count("create_transaction"), 1);
        assert_eq!(h.state.transactions[0].items, vec!["apples"]);
    }

    #[tokio::test]
    async fn deploy_requires_admin() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.command(UserCommand::DeployModel(NewDeployment::with_accuracies(
            "v2".into(),
            0.8,
            0.9,
            0.95,
        )))
        .await;
        assert_eq!(h.notifications()[0].message, "Admin access required");
        assert_eq!(h.api.count("deploy"), 0);
    }

    #[tokio::test]
    async fn admin_deploy_prepends_model() {
        let mut h = Harness::signed_in(FakeApi::new(Role::Admin)).await;
        h.command(UserCommand::DeployModel(NewDeployment::with_accuracies(
            "v2".into(),
            0.8,
            0.9,
            0.95,
        )))
        .await;
        h.settle().await;

        assert_eq!(h.state.models.len(), 1);
        assert_eq!(h.state.models[0].model_version, "v2");
        assert_eq!(h.state.models[0].accuracy(), Some(0.8));
    }

    // -----------------------------------------------------------------------
    // Tests: health and event loop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_check_marks_server_online() {
        let mut h = Harness::with_api(FakeApi::new(Role::User), None);
        h.state.check_health();
        let event = h.api_rx.recv().await.unwrap();
        handle_api_event(&mut h.state, event, &h.ui_tx).await;
        assert_eq!(
            h.state.server_status,
            ServerStatus::Online {
                version: Some("1.0.0".into())
            }
        );
    }

    #[tokio::test]
    async fn health_result_survives_session_change() {
        let mut h = Harness::signed_in(FakeApi::new(Role::User)).await;
        h.state.check_health();
        h.state.logout();
        let event = h.api_rx.recv().await.unwrap();
        handle_api_event(&mut h.state, event, &h.ui_tx).await;
        assert!(matches!(h.state.server_status, ServerStatus::Online { .. }));
    }

    #[tokio::test]
    async fn event_loop_handles_quit_command() {
        let h = Harness::with_api(FakeApi::new(Role::User), None);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (_unused_tx, api_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run(cmd_rx, api_rx, h.ui_tx.clone(), h.state));

        cmd_tx.send(UserCommand::Quit).await.unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn event_loop_sends_initial_snapshot() {
        let Harness {
            state,
            api_rx,
            ui_tx,
            mut ui_rx,
            ..
        } = Harness::with_api(FakeApi::new(Role::User), None);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run(cmd_rx, api_rx, ui_tx, state));

        let update = ui_rx.recv().await.unwrap();
        match update {
            UiUpdate::Snapshot(snapshot) => {
                assert_eq!(snapshot.session, SessionState::Anonymous);
                assert_eq!(snapshot.route, Route::Login);
            }
            other => panic!("Expected Snapshot, got {:?}", other),
        }

        cmd_tx.send(UserCommand::Quit).await.unwrap();
        let _ = handle.await;
    }
}
