use std::net::SocketAddr;

use axum::Router;
use common::{env::ensure_env, utils::logging::init_logging_from_env};
use configs::{AppConfig, ConfigError};
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{errors::StartupError, routes, state::AppState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// `config.toml` if present, otherwise defaults; env fills what the file leaves empty.
pub fn load_config() -> Result<AppConfig, StartupError> {
    let mut cfg = match configs::load_default() {
        Ok(cfg) => cfg,
        Err(ConfigError::Read { path, .. }) => {
            warn!(%path, "configuration file not found; using defaults and environment");
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    cfg.normalize_and_validate()?;
    Ok(cfg)
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Router plus everything it needs, built from configuration.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    ensure_env(&cfg.offload.dir, &[cfg.status.version_file.as_str(), cfg.status.build_file.as_str()]).await?;
    let db = models::db::connect_with_config(&models::db::DatabaseConfig::from(&cfg.database)).await?;
    let state = AppState::from_config(db, cfg)?;
    if !state.worker.test_connection().await {
        warn!("store connection test failed at startup; /status will report it");
    }
    if let Some(blobs) = &state.blobs {
        blobs.sweep_expired().await;
    }
    Ok(routes::build_router(state, build_cors()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Public entry: load configuration, build the app and serve until Ctrl+C.
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging_from_env();

    let cfg = load_config()?;
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting user key/value service");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
