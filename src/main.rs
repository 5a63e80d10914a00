mod app;
mod config;
mod error;
mod state;
mod storage;
mod timesheet;
mod videos;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "timesheet=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.listen_addr();
    tracing::info!(
        backend = config.backend_name(),
        public_dir = %config.public_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "configuration loaded"
    );

    let app_state = AppState::init(config).await?;
    let app = app::build_app(app_state);
    app::serve(app, &addr).await
}
