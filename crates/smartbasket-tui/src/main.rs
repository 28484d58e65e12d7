// SmartBasket entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open local storage and build the session
// 4. Build the API client
// 5. Create mpsc channels
// 6. Spawn app logic task
// 7. Run the TUI until the user quits
// 8. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use smartbasket_core::api::ApiClient;
use smartbasket_core::config;
use smartbasket_core::session::Session;
use smartbasket_core::storage::LocalStorage;
use smartbasket_tui::{app, tui};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("SmartBasket starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: api={}", config.api.base_url);

    let storage_path = config.storage_path.to_string_lossy().into_owned();
    let storage = LocalStorage::open(&storage_path).context("failed to open local storage")?;
    info!("Local storage opened at {}", storage_path);
    let session = Session::new(storage);

    let api = Arc::new(ApiClient::from_config(&config.api));

    let (api_tx, api_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let toast_duration = Duration::from_secs(config.ui.toast_seconds);
    let app_state = app::AppState::new(config, session, api, api_tx);

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, api_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    // Blocks until the user quits.
    if let Err(e) = tui::run(ui_rx, cmd_tx, toast_duration).await {
        error!("TUI error: {}", e);
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("SmartBasket shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (the terminal belongs to the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("smartbasket.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("smartbasket_tui=info,smartbasket_core=info,warn")
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
