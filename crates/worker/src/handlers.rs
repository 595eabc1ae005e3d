//! Trigger bindings for the dispatcher and the sweeper.

use std::sync::Arc;

use async_trait::async_trait;

use relay_common::types::NotificationRecord;
use relay_notifier::Dispatcher;
use relay_store::RecordStore;
use relay_sweeper::Sweeper;

use crate::runtime::{CreateHandler, ScheduledHandler};

#[async_trait]
impl CreateHandler for Dispatcher {
    async fn on_create(&self, record: NotificationRecord, store: Arc<dyn RecordStore>) {
        self.dispatch(&record, store.as_ref()).await;
    }
}

#[async_trait]
impl ScheduledHandler for Sweeper {
    async fn on_tick(&self, store: Arc<dyn RecordStore>) -> anyhow::Result<()> {
        self.sweep(store.as_ref()).await?;
        Ok(())
    }
}
