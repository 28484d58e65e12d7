// Wire types mirrored from the prediction API.
//
// These are display-oriented copies of server state. The client enforces no
// invariants beyond shape; all validation lives server-side.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Account role. Unknown role strings are treated as a regular user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<NaiveDateTime>,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Username/password pair exchanged for a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Registration payload sent to `POST /api/v1/users/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response body of `POST /token`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// One ranked candidate. `probability` is a percentage in 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionItem {
    pub item: String,
    pub probability: f64,
}

/// A next-item prediction for a basket snapshot.
///
/// Predictions returned by `next-item` carry no id; history records do, and
/// only those can receive feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub basket: Vec<String>,
    pub predicted_items: Vec<PredictionItem>,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Prediction {
    /// Comma-joined list of predicted item names, best first.
    pub fn predicted_names(&self) -> String {
        self.predicted_items
            .iter()
            .map(|p| p.item.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Server-side prediction log row: parallel arrays instead of pairs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionLog {
    pub id: i64,
    pub user_id: i64,
    #[serde(with = "timestamp")]
    pub timestamp: NaiveDateTime,
    pub input_data: Vec<String>,
    pub output_data: Vec<String>,
    pub probabilities: Vec<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl From<PredictionLog> for Prediction {
    fn from(log: PredictionLog) -> Self {
        let predicted_items = log
            .output_data
            .into_iter()
            .zip(log.probabilities)
            .map(|(item, probability)| PredictionItem { item, probability })
            .collect();
        Prediction {
            id: Some(log.id),
            basket: log.input_data,
            predicted_items,
            timestamp: log.timestamp,
            feedback: log.feedback,
        }
    }
}

/// A history entry in either of the shapes the history endpoint may return.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HistoryRecord {
    Prediction(Prediction),
    Log(PredictionLog),
}

impl From<HistoryRecord> for Prediction {
    fn from(record: HistoryRecord) -> Self {
        match record {
            HistoryRecord::Prediction(p) => p,
            HistoryRecord::Log(log) => log.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(with = "timestamp")]
    pub date: NaiveDateTime,
    pub items: Vec<String>,
}

/// Body of `POST /api/v1/transactions/`. The server fills in `date` when
/// omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    #[serde(skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub date: Option<NaiveDateTime>,
    pub items: Vec<String>,
}

// ---------------------------------------------------------------------------
// Model deployments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDeployment {
    pub id: i64,
    pub model_version: String,
    pub deployed_by: i64,
    #[serde(with = "timestamp")]
    pub deployment_time: NaiveDateTime,
    pub status: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl ModelDeployment {
    /// Numeric metric by name, if present and numeric.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(|v| v.as_f64())
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.metric("accuracy")
    }
}

/// Body of `POST /api/v1/models/deploy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDeployment {
    pub model_version: String,
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl NewDeployment {
    /// Build a deployment record from the three standard accuracy metrics.
    pub fn with_accuracies(model_version: String, accuracy: f64, top3: f64, top5: f64) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert("accuracy".to_string(), serde_json::json!(accuracy));
        metrics.insert("top3_accuracy".to_string(), serde_json::json!(top3));
        metrics.insert("top5_accuracy".to_string(), serde_json::json!(top5));
        NewDeployment {
            model_version,
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Serde helpers for backend timestamps.
///
/// The backend emits ISO-8601 strings both with and without a UTC offset
/// (`2024-05-01T12:00:00.123456` and `2024-05-01T12:00:00Z`). Both parse into
/// a `NaiveDateTime` holding the wall-clock time as sent.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        NaiveDateTime::parse_from_str(raw, WIRE_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(WIRE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(s) => super::parse(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {s}"))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
