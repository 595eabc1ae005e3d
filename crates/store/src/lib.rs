//! Record Store adapters.
//!
//! The [`RecordStore`] trait is the seam the dispatcher and sweeper depend on.
//! Two implementations ship with the relay:
//! - [`PgRecordStore`]: PostgreSQL, with create events delivered over `LISTEN/NOTIFY`
//! - [`MemoryRecordStore`]: in-process, used by tests and local runs

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryRecordStore;
pub use postgres::{CREATED_CHANNEL, PgRecordStore};
pub use traits::{RecordStore, WATCH_BUFFER};
