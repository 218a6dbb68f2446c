use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use covers::config::Config;
use covers::engine::Engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    covers::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let engine = Arc::new(Engine::new(config.wal_path(), config.capacity_scope)?);
    tokio::spawn(covers::compactor::run_compactor(
        engine.clone(),
        config.compact_threshold,
    ));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("covers listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  capacity_scope: {:?}", config.capacity_scope);
    info!("  compact_threshold: {}", config.compact_threshold);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, covers::api::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("covers stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM. In-flight requests are drained by `axum::serve`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining requests");
}
