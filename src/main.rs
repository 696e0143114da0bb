use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use campusd::config::Config;
use campusd::engine::Engine;
use campusd::notify::NotifyHub;
use campusd::{seed, ticker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    campusd::observability::init(config.metrics_port)?;

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(notify.clone()));

    let campus = match &config.seed {
        Some(path) => seed::load_file(path)?,
        None => seed::demo()?,
    };
    seed::apply(&engine, campus).await?;

    info!("campusd ready");
    info!(
        "  seed: {}",
        config
            .seed
            .as_ref()
            .map_or("built-in demo".to_string(), |p| p.display().to_string())
    );
    info!("  refresh: {}s", config.refresh.as_secs());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let ticker = tokio::spawn(ticker::run_ticker(engine.clone(), config.refresh));

    // Log every committed change as one JSON line.
    let mut events = notify.subscribe_all();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => info!(target: "campusd::events", "{line}"),
                    Err(e) => tracing::warn!("unserializable event {event:?}: {e}"),
                },
                Err(RecvError::Lagged(n)) => tracing::warn!("event log lagged, {n} events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Graceful shutdown on SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("shutdown signal received");
    ticker.abort();
    logger.abort();
    info!("campusd stopped");
    Ok(())
}
