// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gateway entry point.

use fg_invoke::SdkInvoker;
use fg_server::{GatewayConfig, build_app, build_state};
use fg_workflow::TimeoutProcessor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("FG_LOG_FORMAT").is_ok_and(|v| v == "json");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FG_CONFIG").ok())
        .unwrap_or_else(|| "gateway.toml".to_string());
    let config = GatewayConfig::load(&config_path)?;
    for warning in config.validate()? {
        warn!(?warning, "configuration warning");
    }

    let state = build_state(&config, SdkInvoker::new())?;
    let app = build_app(
        state.clone(),
        config.handler_timeout(),
        &config.server.cors_allowed_origins,
    );

    // Workflow timeout processing runs for the life of the server.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let processor = TimeoutProcessor::new(
        state.workflows.clone(),
        config.workflow_timeout_interval(),
    );
    let processor_handle = tokio::spawn(processor.run(shutdown_rx));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = processor_handle.await;
    Ok(())
}
