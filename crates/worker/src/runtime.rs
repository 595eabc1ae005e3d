//! Trigger runtime: explicit handler registration for create events and
//! fixed-interval schedules.
//!
//! Every create event runs in its own task, so concurrent records never wait
//! on each other. Scheduled handlers run to completion on each tick; a failed
//! tick is logged and retried on the next interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use relay_common::types::NotificationRecord;
use relay_store::RecordStore;

/// Reacts to a newly created record.
#[async_trait]
pub trait CreateHandler: Send + Sync + 'static {
    async fn on_create(&self, record: NotificationRecord, store: Arc<dyn RecordStore>);
}

/// Runs once per schedule tick.
#[async_trait]
pub trait ScheduledHandler: Send + Sync + 'static {
    async fn on_tick(&self, store: Arc<dyn RecordStore>) -> anyhow::Result<()>;
}

struct CreateRegistration {
    collection: String,
    handler: Arc<dyn CreateHandler>,
}

struct ScheduleRegistration {
    interval: Duration,
    handler: Arc<dyn ScheduledHandler>,
}

/// Registry of trigger handlers bound to one Record Store.
pub struct TriggerRuntime {
    store: Arc<dyn RecordStore>,
    on_create: Vec<CreateRegistration>,
    schedules: Vec<ScheduleRegistration>,
}

impl TriggerRuntime {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            on_create: Vec::new(),
            schedules: Vec::new(),
        }
    }

    /// Invoke `handler` once per record created in `collection`.
    pub fn register_on_create(
        &mut self,
        collection: &str,
        handler: Arc<dyn CreateHandler>,
    ) -> &mut Self {
        self.on_create.push(CreateRegistration {
            collection: collection.to_string(),
            handler,
        });
        self
    }

    /// Invoke `handler` every `interval`, starting immediately.
    pub fn register_schedule(
        &mut self,
        interval: Duration,
        handler: Arc<dyn ScheduledHandler>,
    ) -> &mut Self {
        self.schedules.push(ScheduleRegistration { interval, handler });
        self
    }

    /// Subscribe every create trigger and start all loops.
    ///
    /// Subscriptions are in place when this returns, so records inserted
    /// afterwards are guaranteed to be observed. Fails before anything is
    /// spawned if a schedule has a zero interval.
    pub async fn start(self) -> anyhow::Result<RunningTriggers> {
        if self.schedules.iter().any(|reg| reg.interval.is_zero()) {
            anyhow::bail!("schedule interval must be greater than zero");
        }

        let (stop, stop_rx) = watch::channel(false);
        let mut loops = JoinSet::new();

        for reg in self.on_create {
            let rx = self.store.watch_created(&reg.collection).await?;
            tracing::info!(collection = %reg.collection, "Create trigger registered");
            loops.spawn(create_loop(
                reg.collection,
                rx,
                reg.handler,
                self.store.clone(),
                stop_rx.clone(),
            ));
        }

        for reg in self.schedules {
            tracing::info!(
                interval_secs = reg.interval.as_secs(),
                "Schedule trigger registered"
            );
            loops.spawn(schedule_loop(
                reg.interval,
                reg.handler,
                self.store.clone(),
                stop_rx.clone(),
            ));
        }

        Ok(RunningTriggers { stop, loops })
    }

    /// Start all triggers and run until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.start().await?;
        shutdown.await;
        running.shutdown().await;
        Ok(())
    }
}

/// Handle to started trigger loops.
pub struct RunningTriggers {
    stop: watch::Sender<bool>,
    loops: JoinSet<()>,
}

impl RunningTriggers {
    /// Stop accepting events and wait for in-flight handlers to finish.
    ///
    /// Events already buffered when the stop arrives are still handled.
    pub async fn shutdown(mut self) {
        tracing::info!("Stopping triggers, draining in-flight handlers");
        // Loops that already exited have dropped their receivers.
        let _ = self.stop.send(true);

        while let Some(res) = self.loops.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "Trigger loop panicked");
            }
        }
    }
}

async fn create_loop(
    collection: String,
    mut events: mpsc::Receiver<NotificationRecord>,
    handler: Arc<dyn CreateHandler>,
    store: Arc<dyn RecordStore>,
    mut stop: watch::Receiver<bool>,
) {
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(record) => spawn_handler(&mut inflight, &handler, &store, record),
                None => {
                    tracing::warn!(collection = %collection, "Create event stream closed");
                    break;
                }
            },
            Some(res) = inflight.join_next(), if !inflight.is_empty() => {
                if let Err(e) = res {
                    tracing::error!(collection = %collection, error = %e, "Create handler panicked");
                }
            }
            _ = stop.changed() => {
                events.close();
                let mut drained = 0usize;
                while let Some(record) = events.recv().await {
                    spawn_handler(&mut inflight, &handler, &store, record);
                    drained += 1;
                }
                if drained > 0 {
                    tracing::info!(collection = %collection, drained, "Handling buffered events before stop");
                }
                break;
            }
        }
    }

    while let Some(res) = inflight.join_next().await {
        if let Err(e) = res {
            tracing::error!(collection = %collection, error = %e, "Create handler panicked");
        }
    }
}

fn spawn_handler(
    inflight: &mut JoinSet<()>,
    handler: &Arc<dyn CreateHandler>,
    store: &Arc<dyn RecordStore>,
    record: NotificationRecord,
) {
    let handler = handler.clone();
    let store = store.clone();
    inflight.spawn(async move { handler.on_create(record, store).await });
}

async fn schedule_loop(
    interval: Duration,
    handler: Arc<dyn ScheduledHandler>,
    store: Arc<dyn RecordStore>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = handler.on_tick(store.clone()).await {
                    tracing::error!(error = %e, "Scheduled run failed, retrying next interval");
                }
            }
            _ = stop.changed() => break,
        }
    }
}
