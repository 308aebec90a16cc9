use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use promptform::config::{init_logging, AppConfig, CliArgs};
use promptform::dispatch::Dispatcher;
use promptform::lm::OpenAiCompatibleLm;
use promptform::web;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let config = AppConfig::load_with_cli(&cli)?;
    init_logging(&config.log)?;
    config.validate()?;

    let lm = Arc::new(OpenAiCompatibleLm::new(&config.lm));
    let dispatcher = Arc::new(Dispatcher::new(lm, config.dispatch_options())?);
    info!(
        "using model {} at {} with a {}s timeout",
        config.lm.model, config.lm.api_base, config.lm.timeout_secs
    );

    let listener = tokio::net::TcpListener::bind(config.server.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.addr))?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, web::router(dispatcher))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => warn!("failed to listen for Ctrl-C: {}", e),
    }
}
