use std::sync::Arc;

use anyhow::Context;
use danmaku::{IntakeStatistics, RetentionBuffer};
use danmu_relay::api::{ApiServer, AppState};
use danmu_relay::config::RelayConfig;
use danmu_relay::ingest::IngestListener;
use danmu_relay::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env_or_default();
    let (logging_config, _log_guard) = logging::init_logging(config.log_dir.as_deref())?;
    config.validate()?;

    let buffer = Arc::new(RetentionBuffer::new(config.buffer_capacity));
    let stats = Arc::new(IntakeStatistics::new());

    let listener = IngestListener::bind(config.ingest.clone(), buffer.clone(), stats.clone())
        .await
        .with_context(|| {
            format!(
                "failed to bind ingest listener on {}:{}",
                config.ingest.bind_address, config.ingest.port
            )
        })?;
    let ingest_token = listener.cancel_token();
    let ingest_task = tokio::spawn(listener.run());

    let api = if config.api.enabled {
        let state = AppState::new(buffer.clone(), stats.clone()).with_logging(logging_config);
        let server = Arc::new(ApiServer::new(config.api.clone(), state));
        let api_listener = server.bind().await.with_context(|| {
            format!(
                "failed to bind API server on {}:{}",
                config.api.bind_address, config.api.port
            )
        })?;
        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(api_listener).await })
        };
        Some((server, task))
    } else {
        None
    };

    info!(capacity = buffer.capacity(), "danmu-relay started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    ingest_token.cancel();
    if let Some((server, _)) = &api {
        server.shutdown();
    }

    match ingest_task.await {
        Ok(Err(e)) => error!(error = %e, "Ingest listener failed"),
        Err(e) => error!(error = %e, "Ingest listener task panicked"),
        Ok(Ok(())) => {}
    }
    if let Some((_, task)) = api {
        match task.await {
            Ok(Err(e)) => error!(error = %e, "API server failed"),
            Err(e) => error!(error = %e, "API server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    info!(
        retained = buffer.len(),
        total_pushed = buffer.total_pushed(),
        "danmu-relay stopped"
    );

    Ok(())
}
