mod config;
mod logging;

use anyhow::Result;
use tracing::{error, info};

use aula_api::http::{create_router, AppState};
use aula_sfu::SfuManager;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration: env var path override > CWD > /config/ mount
    let config = match config::resolve_config_path() {
        Some(path) => {
            eprintln!("Loading config from {path}");
            match Config::from_file(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Failed to load {path}: {e}");
                    eprintln!("Falling back to environment variables");
                    Config::from_env().unwrap_or_default()
                }
            }
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env().unwrap_or_default()
        }
    };

    // 2. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Aula SFU server starting...");
    info!("HTTP address: {}", config.http_address());

    // 4. Build the SFU manager; no workers means no service.
    let sfu = SfuManager::new(config.sfu.clone())
        .map_err(|e| anyhow::anyhow!("Failed to start worker pool: {e}"))?;
    info!(workers = sfu.worker_count(), "SFU manager initialized");

    // 5. A dead worker strands every room assigned to it, so treat any
    // death as fatal and let the supervisor restart the process.
    let mut death_rx = sfu.subscribe_worker_death();
    tokio::spawn(async move {
        while death_rx.changed().await.is_ok() {
            if let Some(index) = *death_rx.borrow() {
                error!(worker_index = index, "Media worker died, shutting down");
                std::process::exit(1);
            }
        }
    });

    // 6. Serve HTTP + WebSocket signaling until ctrl-c.
    let state = AppState::new(sfu);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.http_address()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install ctrl-c handler: {e}");
        return;
    }
    info!("Shutdown signal received");
}
