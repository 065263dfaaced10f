use balance_tracker::{api::Server, audit::create_sink, config::Config, service::assemble};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// The main entry point for the balance tracker.
///
/// Loads configuration, assembles the ledger and its drain, runs the
/// scheduled drain in the background (durable mode) and serves the REST API
/// until Ctrl-C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("balance_tracker=info")),
        )
        .init();

    let config = Config::load_from_env_or("config/default.toml")?;
    info!("Balance tracker starting with config: {:?}", config);

    let sink = create_sink(&config.audit)?;
    let assembly = assemble(&config, sink).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Durable mode only; stops between ticks when shutdown fires
    let drain_task = assembly.scheduled_drain.map(|drain| {
        let drain = Arc::new(drain);
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { drain.run(shutdown).await })
    });

    let server = Server::new(&config, assembly.service);
    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(task) = drain_task {
        if let Err(e) = task.await {
            error!("Scheduled drain task failed: {}", e);
        }
    }

    info!("Balance tracker stopped");
    Ok(())
}
