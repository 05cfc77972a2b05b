//! Auto-event scheduling.
//!
//! A device may declare auto events: poll one resource (or command) every
//! `frequency`, optionally publishing only when the value changed. This
//! module owns that machinery:
//!
//! - [`ScheduleSpec`]: immutable description of one schedule
//! - [`ScheduleExecutor`]: the timer loop of one schedule
//! - [`ChangeFilter`]: per-executor last-value store for on-change schedules
//! - [`DispatchLimiter`]: bound on concurrent publishes across all schedules
//! - [`SchedulerRegistry`]: lifecycle of every executor of a service
//!
//! Reads, publishes and the admin lock are reached through the traits in
//! [`gateway`], never directly.

mod executor;
mod filter;
pub mod gateway;
mod limiter;
mod registry;
mod schedule;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{ExecutorContext, ExecutorOutcome, ExecutorStats, ScheduleExecutor, TickOutcome};
pub use filter::{ChangeFilter, LastValueRecord, payload_digest};
pub use gateway::{LockState, PublishGateway, ReadGateway};
pub use limiter::{DispatchLimiter, DispatchPermit};
pub use registry::{DEFAULT_SHUTDOWN_GRACE, ExecutorHandle, SchedulerRegistry, ShutdownReport};
pub use schedule::{MAX_INTERVAL, ScheduleKey, ScheduleSpec, parse_frequency};
