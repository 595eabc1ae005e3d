pub mod sweeper;

pub use sweeper::{DELETE_BATCH_SIZE, RETENTION_WINDOW_DAYS, SweepReport, Sweeper};
