use relay_common::config::AppConfig;
use relay_worker::{init, register_triggers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_worker=info,relay_notifier=info,relay_sweeper=info,relay_store=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Notification relay starting...");

    let config = AppConfig::from_env()?;
    let services = init(config).await?;

    let runtime = register_triggers(&services);

    // Run with graceful shutdown on Ctrl+C
    runtime
        .run(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received shutdown signal, stopping gracefully..."),
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
            }
        })
        .await?;

    tracing::info!("Notification relay stopped.");
    Ok(())
}
