// Client configuration (config/client.toml), seeded from defaults/.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "SMARTBASKET_API_URL";

const CONFIG_FILE: &str = "client.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub predictions: PredictionsConfig,
    pub ui: UiConfig,
    /// Resolved location of the local-storage database.
    pub storage_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientFile {
    api: ApiConfig,
    #[serde(default)]
    predictions: PredictionsConfig,
    #[serde(default)]
    storage: StorageSection,
    #[serde(default)]
    ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Versioned API base, e.g. `http://localhost:8000/api/v1`.
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionsConfig {
    /// How many records to request from the history endpoint.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for PredictionsConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StorageSection {
    /// Empty means "use the platform data directory".
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_toast_seconds")]
    pub toast_seconds: u64,
    #[serde(default = "default_health_check_secs")]
    pub health_check_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_seconds: default_toast_seconds(),
            health_check_secs: default_health_check_secs(),
        }
    }
}

fn default_history_limit() -> u32 {
    10
}

fn default_toast_seconds() -> u64 {
    4
}

fn default_health_check_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate `config/client.toml` under `base_dir`.
///
/// Does not copy defaults and ignores the environment; `load_config()` does
/// both.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    let file: ClientFile =
        toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.clone(),
            source,
        })?;

    let config = Config {
        api: ApiConfig {
            base_url: file.api.base_url.trim().trim_end_matches('/').to_string(),
        },
        predictions: file.predictions,
        ui: file.ui,
        storage_path: resolve_storage_path(&file.storage.path),
    };

    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides through `lookup` and re-validate.
pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
        config.api.base_url = url.trim().trim_end_matches('/').to_string();
    }
    validate(&config)?;
    Ok(config)
}

/// Load config relative to the current working directory, seeding
/// `config/` from `defaults/` and honoring `SMARTBASKET_API_URL`.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let config = load_config_from(&cwd)?;
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Copy every file in `defaults/` that is missing from `config/`.
///
/// Existing files are never overwritten and `.example` templates are
/// skipped. Returns the paths that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither defaults/ nor config/ directory found in {}",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigError::DefaultsCopyError {
                message: format!("failed to read defaults entry: {e}"),
            })?
            .path();
        let Some(name) = path.file_name().filter(|_| path.is_file()) else {
            continue;
        };
        if name.to_string_lossy().ends_with(".example") {
            continue;
        }
        if copy_if_missing(&path, &config_dir.join(name))? {
            copied.push(config_dir.join(name));
        }
    }

    Ok(copied)
}

fn copy_if_missing(from: &Path, to: &Path) -> Result<bool, ConfigError> {
    use std::io::Write;

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
    {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to create {}: {e}", to.display()),
            })
        }
    };
    let content = std::fs::read(from).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read {}: {e}", from.display()),
    })?;
    dest.write_all(&content)
        .map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to write {}: {e}", to.display()),
        })?;
    Ok(true)
}

/// Empty path -> `<data dir>/client.db`, falling back to the working
/// directory when the platform has no data dir.
fn resolve_storage_path(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if !raw.is_empty() {
        return PathBuf::from(raw);
    }
    directories::ProjectDirs::from("", "", "smartbasket")
        .map(|dirs| dirs.data_dir().join("client.db"))
        .unwrap_or_else(|| PathBuf::from("smartbasket.db"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = &config.api.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "api.base_url".into(),
            message: format!("must be an http(s) URL, got {url:?}"),
        });
    }

    if config.predictions.history_limit == 0 {
        return Err(ConfigError::ValidationError {
            field: "predictions.history_limit".into(),
            message: "must be greater than 0".into(),
        });
    }

    let ui_fields: &[(&str, u64)] = &[
        ("ui.toast_seconds", config.ui.toast_seconds),
        ("ui.health_check_secs", config.ui.health_check_secs),
    ];
    for (name, val) in ui_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be greater than 0".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
