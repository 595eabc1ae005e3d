use serde::Deserialize;

/// Default FCM HTTP v1 endpoint.
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection before failing (default: 5)
    pub db_acquire_timeout_secs: u64,

    /// Firebase project that owns the messaging sender
    pub fcm_project_id: String,

    /// Pre-minted OAuth2 bearer token for the FCM HTTP v1 API
    pub fcm_access_token: String,

    /// Base URL of the FCM API (overridable for tests and emulators)
    pub fcm_endpoint: String,

    /// Per-request timeout for push delivery, in seconds (default: 10)
    pub fcm_timeout_secs: u64,

    /// Interval between retention sweeps, in seconds (default: 86400 = 24h).
    /// Must be non-zero.
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sweep_interval_secs: u64 = lookup("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|| "86400".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("SWEEP_INTERVAL_SECS must be a valid u64"))?;
        if sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            db_acquire_timeout_secs: lookup("DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_ACQUIRE_TIMEOUT_SECS must be a valid u64"))?,
            fcm_project_id: lookup("FCM_PROJECT_ID")
                .ok_or_else(|| anyhow::anyhow!("FCM_PROJECT_ID environment variable is required"))?,
            fcm_access_token: lookup("FCM_ACCESS_TOKEN").ok_or_else(|| {
                anyhow::anyhow!("FCM_ACCESS_TOKEN environment variable is required")
            })?,
            fcm_endpoint: lookup("FCM_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_FCM_ENDPOINT.to_string()),
            fcm_timeout_secs: lookup("FCM_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FCM_TIMEOUT_SECS must be a valid u64"))?,
            sweep_interval_secs,
        })
    }
}
