// REST client for the prediction API.
//
// `ApiClient` is stateless with respect to authentication: every protected
// call takes the bearer token explicitly, so the session (and nobody else)
// decides which token is current. The `BasketApi` trait is the seam the app
// orchestrator programs against; tests substitute an in-process fake.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::models::{
    Credentials, HealthStatus, HistoryRecord, ModelDeployment, NewDeployment, NewTransaction,
    NewUser, Prediction, TokenResponse, Transaction, User,
};

/// Message shown for transport-level failures.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";

/// Path suffix that separates the versioned API from the server root.
const API_PREFIX: &str = "/api/v1";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("request failed with status {status}")]
    Status { status: u16, detail: Option<String> },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err)
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Server-provided `detail`, if the error body carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Text to show the user: the server's detail when present, `fallback`
    /// for other HTTP failures, and a generic message for transport errors.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Status { .. } | ApiError::Decode(_) => fallback.to_string(),
            ApiError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Handles `{"detail": "..."}` and validation errors of the form
/// `{"detail": [{"msg": "..."}, ...]}`.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(entries) => {
            let msgs: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// BasketApi trait
// ---------------------------------------------------------------------------

/// Every REST operation the client performs.
#[async_trait]
pub trait BasketApi: Send + Sync {
    /// Exchange credentials for a bearer token (`POST /token`).
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError>;
    async fn register(&self, new_user: &NewUser) -> Result<User, ApiError>;
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;
    async fn predict_next_item(&self, token: &str, items: &[String]) -> Result<Prediction, ApiError>;
    async fn prediction_history(&self, token: &str, limit: u32) -> Result<Vec<Prediction>, ApiError>;
    async fn submit_feedback(&self, token: &str, prediction_id: i64, feedback: &str) -> Result<(), ApiError>;
    async fn transactions(&self, token: &str) -> Result<Vec<Transaction>, ApiError>;
    async fn create_transaction(&self, token: &str, tx: &NewTransaction) -> Result<Transaction, ApiError>;
    async fn models(&self, token: &str) -> Result<Vec<ModelDeployment>, ApiError>;
    async fn deploy_model(&self, token: &str, deployment: &NewDeployment) -> Result<ModelDeployment, ApiError>;
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// reqwest-backed implementation of `BasketApi`.
pub struct ApiClient {
    http: reqwest::Client,
    /// Versioned API base, e.g. `http://host:8000/api/v1` (no trailing slash).
    base_url: String,
    /// Server root hosting `/token` and `/health`.
    root_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let root_url = root_url_for(&base_url);
        Self {
            http: reqwest::Client::new(),
            base_url,
            root_url,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.root_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Strip the `/api/v1` suffix to find the server root.
pub fn root_url_for(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .strip_suffix(API_PREFIX)
        .unwrap_or(trimmed)
        .to_string()
}

/// Turn non-2xx responses into `ApiError::Status`, keeping the detail.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    warn!(status = status.as_u16(), ?detail, "API request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl BasketApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse, ApiError> {
        debug!(username = %credentials.username, "requesting token");
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        self.send_json(self.http.post(self.token_url()).form(&form))
            .await
    }

    async fn register(&self, new_user: &NewUser) -> Result<User, ApiError> {
        debug!(username = %new_user.username, "registering user");
        self.send_json(self.http.post(self.url("/users/")).json(new_user))
            .await
    }

    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        self.send_json(self.http.get(self.url("/users/me")).bearer_auth(token))
            .await
    }

    async fn predict_next_item(&self, token: &str, items: &[String]) -> Result<Prediction, ApiError> {
        debug!(basket_size = items.len(), "requesting next-item prediction");
        let body = serde_json::json!({ "items": items });
        self.send_json(
            self.http
                .post(self.url("/predictions/next-item"))
                .bearer_auth(token)
                .json(&body),
        )
        .await
    }

    async fn prediction_history(&self, token: &str, limit: u32) -> Result<Vec<Prediction>, ApiError> {
        let records: Vec<HistoryRecord> = self
            .send_json(
                self.http
                    .get(self.url("/predictions/history"))
                    .query(&[("limit", limit)])
                    .bearer_auth(token),
            )
            .await?;
        Ok(records.into_iter().map(Prediction::from).collect())
    }

    async fn submit_feedback(&self, token: &str, prediction_id: i64, feedback: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "feedback": feedback });
        let request = self
            .http
            .post(self.url(&format!("/predictions/{prediction_id}/feedback")))
            .bearer_auth(token)
            .json(&body);
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn transactions(&self, token: &str) -> Result<Vec<Transaction>, ApiError> {
        self.send_json(self.http.get(self.url("/transactions")).bearer_auth(token))
            .await
    }

    async fn create_transaction(&self, token: &str, tx: &NewTransaction) -> Result<Transaction, ApiError> {
        self.send_json(
            self.http
                .post(self.url("/transactions/"))
                .bearer_auth(token)
                .json(tx),
        )
        .await
    }

    async fn models(&self, token: &str) -> Result<Vec<ModelDeployment>, ApiError> {
        self.send_json(self.http.get(self.url("/models")).bearer_auth(token))
            .await
    }

    async fn deploy_model(&self, token: &str, deployment: &NewDeployment) -> Result<ModelDeployment, ApiError> {
        self.send_json(
            self.http
                .post(self.url("/models/deploy"))
                .bearer_auth(token)
                .json(deployment),
        )
        .await
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.send_json(self.http.get(format!("{}/health", self.root_url)))
            .await
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
