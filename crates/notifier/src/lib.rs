//! Push delivery for newly created notification requests.
//!
//! - `message`: FCM-shaped delivery message built from a record
//! - `gateway`: the `PushGateway` seam and its FCM HTTP v1 adapter
//! - `dispatcher`: idempotency guard, single send, outcome write-back

pub mod dispatcher;
pub mod gateway;
pub mod message;

pub use dispatcher::{DispatchOutcome, Dispatcher, SkipReason, WriteOutcome};
pub use gateway::{FcmGateway, MessageId, PushGateway, UNKNOWN_MESSAGE_ID};
pub use message::PushMessage;
