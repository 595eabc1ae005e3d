//! Trigger runtime tests against the in-memory Record Store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use relay_common::config::AppConfig;
use relay_common::error::DeliveryError;
use relay_common::types::{DeliveryStatus, NewNotification, RecordPatch};
use relay_notifier::{MessageId, PushGateway, PushMessage};
use relay_store::{MemoryRecordStore, RecordStore};
use relay_worker::{ScheduledHandler, Services, TriggerRuntime, register_triggers};

// ============================================================
// Helpers
// ============================================================

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<PushMessage>>,
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &PushMessage) -> Result<MessageId, DeliveryError> {
        self.sent.lock().await.push(message.clone());
        if message.token.starts_with("bad") {
            return Err(DeliveryError::new("invalid token"));
        }
        Ok(format!("projects/test/messages/{}", message.token))
    }
}

fn test_config(sweep_interval_secs: u64) -> AppConfig {
    AppConfig {
        database_url: "unused".to_string(),
        db_max_connections: 1,
        db_acquire_timeout_secs: 1,
        fcm_project_id: "wavechat".to_string(),
        fcm_access_token: "unused".to_string(),
        fcm_endpoint: "http://unused".to_string(),
        fcm_timeout_secs: 1,
        sweep_interval_secs,
    }
}

fn services(store: Arc<MemoryRecordStore>, gateway: Arc<RecordingGateway>) -> Services {
    Services::new(store, gateway, test_config(86_400))
}

/// Poll until `check` holds, yielding to the runtime between attempts.
async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Counts ticks; fails the first one.
#[derive(Default)]
struct FlakyTick {
    ticks: AtomicUsize,
}

#[async_trait]
impl ScheduledHandler for FlakyTick {
    async fn on_tick(&self, _store: Arc<dyn RecordStore>) -> anyhow::Result<()> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            anyhow::bail!("store unavailable");
        }
        Ok(())
    }
}

// ============================================================
// Create trigger
// ============================================================

#[tokio::test]
async fn test_created_record_is_dispatched() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let running = register_triggers(&services(store.clone(), gateway.clone()))
        .start()
        .await
        .unwrap();

    let record = store
        .insert(NewNotification::new("tok1", "Hi", "there"))
        .await;

    let id = record.id;
    wait_for(|| {
        let store = store.clone();
        async move { store.get(id).await.is_some_and(|r| r.sent) }
    })
    .await;
    running.shutdown().await;

    let sent = gateway.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok1");
    assert!(store.get(record.id).await.unwrap().sent_at.is_some());
}

#[tokio::test]
async fn test_concurrent_records_are_independent() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let running = register_triggers(&services(store.clone(), gateway.clone()))
        .start()
        .await
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..20 {
        let token = if i % 5 == 0 { format!("bad{i}") } else { format!("tok{i}") };
        ids.push(store.insert(NewNotification::new(token, "t", "b")).await.id);
    }

    wait_for(|| {
        let store = store.clone();
        let ids = ids.clone();
        async move {
            for id in ids {
                match store.get(id).await {
                    Some(r) if r.status() != DeliveryStatus::Pending => {}
                    _ => return false,
                }
            }
            true
        }
    })
    .await;
    running.shutdown().await;

    assert_eq!(gateway.sent.lock().await.len(), 20);
    let mut errored = 0;
    for id in ids {
        if store.get(id).await.unwrap().status() == DeliveryStatus::Errored {
            errored += 1;
        }
    }
    assert_eq!(errored, 4);
}

#[tokio::test]
async fn test_guarded_record_is_left_untouched() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let running = register_triggers(&services(store.clone(), gateway.clone()))
        .start()
        .await
        .unwrap();

    let blank = store.insert(NewNotification::new("", "x", "y")).await;
    let marker = store
        .insert(NewNotification::new("tok1", "Hi", "there"))
        .await;

    let marker_id = marker.id;
    wait_for(|| {
        let store = store.clone();
        async move { store.get(marker_id).await.is_some_and(|r| r.sent) }
    })
    .await;
    running.shutdown().await;

    assert_eq!(store.get(blank.id).await.unwrap(), blank);
    assert_eq!(gateway.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn test_pending_record_before_start_is_dispatched() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());

    // Written while no worker was running.
    let waiting = store
        .insert(NewNotification::new("tok1", "Hi", "there"))
        .await;
    let failed = store.insert(NewNotification::new("tok2", "x", "y")).await;
    store
        .update(failed.id, &RecordPatch::failed("invalid token"))
        .await
        .unwrap();

    let running = register_triggers(&services(store.clone(), gateway.clone()))
        .start()
        .await
        .unwrap();

    let id = waiting.id;
    wait_for(|| {
        let store = store.clone();
        async move { store.get(id).await.is_some_and(|r| r.sent) }
    })
    .await;
    running.shutdown().await;

    let sent = gateway.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok1");
    assert_eq!(
        store.get(failed.id).await.unwrap().error.as_deref(),
        Some("invalid token")
    );
}

#[tokio::test]
async fn test_buffered_events_are_handled_on_shutdown() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let running = register_triggers(&services(store.clone(), gateway.clone()))
        .start()
        .await
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(
            store
                .insert(NewNotification::new(format!("tok{i}"), "t", "b"))
                .await
                .id,
        );
    }
    running.shutdown().await;

    assert_eq!(gateway.sent.lock().await.len(), 10);
    for id in ids {
        assert!(store.get(id).await.unwrap().sent);
    }
}

#[tokio::test]
async fn test_unknown_collection_fails_start() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway: Arc<dyn PushGateway> = Arc::new(RecordingGateway::default());

    let mut runtime = TriggerRuntime::new(store);
    runtime.register_on_create(
        "messages",
        Arc::new(relay_notifier::Dispatcher::new(gateway)),
    );

    assert!(runtime.start().await.is_err());
}

// ============================================================
// Schedule trigger
// ============================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_runs_on_schedule() {
    let store = Arc::new(MemoryRecordStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let services = Services::new(store.clone(), gateway, test_config(86_400));

    let old = Utc::now() - chrono::Duration::days(8);
    for i in 0..3 {
        store
            .insert_at(NewNotification::new(format!("old{i}"), "", ""), old)
            .await;
    }

    let running = register_triggers(&services).start().await.unwrap();

    // First tick fires immediately.
    wait_for(|| {
        let store = store.clone();
        async move { store.is_empty().await }
    })
    .await;

    store
        .insert_at(NewNotification::new("late", "", ""), old)
        .await;
    tokio::time::sleep(Duration::from_secs(86_400)).await;
    wait_for(|| {
        let store = store.clone();
        async move { store.is_empty().await }
    })
    .await;

    running.shutdown().await;
}

#[tokio::test]
async fn test_zero_interval_schedule_fails_start() {
    let store = Arc::new(MemoryRecordStore::new());
    let flaky = Arc::new(FlakyTick::default());

    let mut runtime = TriggerRuntime::new(store);
    runtime.register_schedule(Duration::ZERO, flaky.clone());

    let err = runtime.start().await.err().unwrap();
    assert!(err.to_string().contains("greater than zero"));
    assert_eq!(flaky.ticks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_is_retried_next_interval() {
    let store = Arc::new(MemoryRecordStore::new());
    let flaky = Arc::new(FlakyTick::default());

    let mut runtime = TriggerRuntime::new(store);
    runtime.register_schedule(Duration::from_secs(60), flaky.clone());
    let running = runtime.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    running.shutdown().await;

    assert_eq!(flaky.ticks.load(Ordering::SeqCst), 2);
}
