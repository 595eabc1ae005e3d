use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::AppConfig;

/// Open the relay's PostgreSQL pool with the configured size and acquire timeout.
pub async fn create_pool(config: &AppConfig) -> anyhow::Result<PgPool> {
    let max_connections = config.db_max_connections;
    let acquire_timeout = Duration::from_secs(config.db_acquire_timeout_secs);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max_connections,
        acquire_timeout_secs = acquire_timeout.as_secs(),
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
