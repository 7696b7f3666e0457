pub mod controller;
pub mod state;

pub use controller::{ResetCallback, ResetScheduler, SchedulerSnapshot};
pub use state::{format_countdown, SchedulerState, SchedulerStatus};
