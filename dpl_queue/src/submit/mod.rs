//! Submission: the dispatcher and what is layered on it.

pub mod dispatcher;
pub mod double_buffer;
pub mod health;
pub mod ticket;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use double_buffer::{DoubleBufferScheduler, StepReport};
pub use health::{HangReport, Health, HealthMonitor};
pub use ticket::{SubmitMode, SyncOutcome, Ticket};
