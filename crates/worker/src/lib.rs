//! Relay worker: explicit bootstrap plus the trigger runtime that feeds
//! create events to the dispatcher and timer ticks to the sweeper.

pub mod handlers;
pub mod runtime;
pub mod state;

pub use runtime::{CreateHandler, RunningTriggers, ScheduledHandler, TriggerRuntime};
pub use state::{Services, init, register_triggers};
