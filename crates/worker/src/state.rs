//! Process-wide services, built once by `init` before any trigger runs.

use std::sync::Arc;
use std::time::Duration;

use relay_common::config::AppConfig;
use relay_common::db::create_pool;
use relay_common::types::NOTIFICATIONS_COLLECTION;
use relay_notifier::{Dispatcher, FcmGateway, PushGateway};
use relay_store::{PgRecordStore, RecordStore};
use relay_sweeper::Sweeper;

use crate::runtime::TriggerRuntime;

/// Handles to the external collaborators, passed explicitly to every handler.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub gateway: Arc<dyn PushGateway>,
    pub config: AppConfig,
}

impl Services {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn PushGateway>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }
}

/// Connect to PostgreSQL, apply migrations and build the FCM client.
pub async fn init(config: AppConfig) -> anyhow::Result<Services> {
    let pool = create_pool(&config).await?;

    let store = PgRecordStore::new(pool);
    store.migrate().await?;

    let gateway = FcmGateway::from_config(&config)?;
    tracing::info!(project = %config.fcm_project_id, "Push gateway configured");

    Ok(Services::new(Arc::new(store), Arc::new(gateway), config))
}

/// Bind the dispatcher to notification inserts and the sweeper to its schedule.
pub fn register_triggers(services: &Services) -> TriggerRuntime {
    let mut runtime = TriggerRuntime::new(services.store.clone());
    runtime
        .register_on_create(
            NOTIFICATIONS_COLLECTION,
            Arc::new(Dispatcher::new(services.gateway.clone())),
        )
        .register_schedule(
            Duration::from_secs(services.config.sweep_interval_secs),
            Arc::new(Sweeper::new()),
        );
    runtime
}
