//! The cron scheduler.
//!
//! Maintains an in-memory table of automation → cron job. Each job runs a
//! timer task that sleeps until the expression's next tick in the
//! automation's timezone and then fires the workflow through the engine.
//! Fires are singleflight per automation: a tick that lands while the
//! previous run is still in flight is skipped, never queued. Concurrency
//! across automations is unbounded.

mod error;
mod expression;
mod scheduler;

pub use error::SchedulerError;
pub use expression::parse_expression;
pub use scheduler::{CronScheduler, FireOutcome, JobStatus, SchedulerStore};
