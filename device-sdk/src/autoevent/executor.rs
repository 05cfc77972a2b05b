//! ScheduleExecutor implementation.
//!
//! A ScheduleExecutor owns the timer of a single (device, resource) schedule.
//! On every tick it:
//!
//! 1. terminates if it was stopped or the device service is locked
//! 2. reads the resource inline, so reads of one schedule never overlap
//! 3. drops empty batches and, with on-change enabled, repeated batches
//! 4. hands the batch to a detached publish task gated by the shared
//!    [`DispatchLimiter`], so a slow ingestion service never delays a read
//!
//! Read and publish failures are logged and the schedule waits for its next
//! tick. Nothing is retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use device_contracts::Event;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::filter::ChangeFilter;
use super::gateway::{LockState, PublishGateway, ReadGateway};
use super::limiter::DispatchLimiter;
use super::schedule::ScheduleSpec;
use crate::Result;
use crate::config::AutoEventConfig;

/// Collaborators shared by every executor of a registry.
#[derive(Clone)]
pub struct ExecutorContext {
    pub reader: Arc<dyn ReadGateway>,
    pub publisher: Arc<dyn PublishGateway>,
    pub lock_state: Arc<dyn LockState>,
    pub limiter: DispatchLimiter,
    /// Tracks detached publish tasks so shutdown can wait for them.
    pub dispatches: TaskTracker,
}

impl ExecutorContext {
    pub fn new(
        reader: Arc<dyn ReadGateway>,
        publisher: Arc<dyn PublishGateway>,
        lock_state: Arc<dyn LockState>,
        limiter: DispatchLimiter,
    ) -> Self {
        Self {
            reader,
            publisher,
            lock_state,
            limiter,
            dispatches: TaskTracker::new(),
        }
    }
}

/// Why an executor's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorOutcome {
    /// The governing cancellation token fired.
    Cancelled,
    /// `stop()` was observed at a tick boundary.
    Stopped,
    /// The device service was administratively locked.
    Locked,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Dispatched,
    Suppressed,
    Empty,
    ReadFailed,
    Stopped,
    Locked,
}

/// Counters describing what an executor has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub reads: u64,
    pub read_failures: u64,
    pub empty: u64,
    pub suppressed: u64,
    pub dispatched: u64,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    read_failures: AtomicU64,
    empty: AtomicU64,
    suppressed: AtomicU64,
    dispatched: AtomicU64,
}

/// Periodic poller for one schedule.
#[derive(Debug)]
pub struct ScheduleExecutor {
    id: Uuid,
    spec: ScheduleSpec,
    stopped: AtomicBool,
    running: AtomicBool,
    /// Present only when on-change filtering is enabled.
    filter: Option<ChangeFilter>,
    counters: Counters,
}

impl ScheduleExecutor {
    pub fn new(spec: ScheduleSpec) -> Self {
        let filter = spec.on_change().then(ChangeFilter::new);
        Self {
            id: Uuid::new_v4(),
            spec,
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(false),
            filter,
            counters: Counters::default(),
        }
    }

    /// Build an executor straight from configuration.
    ///
    /// Fails with a configuration error when the frequency does not parse.
    pub fn from_auto_event(device_name: &str, auto_event: &AutoEventConfig) -> Result<Self> {
        Ok(Self::new(ScheduleSpec::from_auto_event(device_name, auto_event)?))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    pub fn filter(&self) -> Option<&ChangeFilter> {
        self.filter.as_ref()
    }

    /// Request termination at the next tick boundary. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(
                device = %self.spec.device_name(),
                resource = %self.spec.resource_name(),
                "Auto event stop requested"
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Whether a run loop is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            read_failures: self.counters.read_failures.load(Ordering::Relaxed),
            empty: self.counters.empty.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
        }
    }

    /// Drive the schedule until cancelled, stopped or locked out.
    ///
    /// The first tick fires one full interval after the call. Cancellation is
    /// only observed while waiting; an in-flight read is never interrupted.
    pub async fn run(
        &self,
        ctx: ExecutorContext,
        cancellation_token: CancellationToken,
    ) -> ExecutorOutcome {
        let period = self.spec.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.running.store(true, Ordering::SeqCst);

        debug!(
            device = %self.spec.device_name(),
            resource = %self.spec.resource_name(),
            interval = ?period,
            on_change = self.spec.on_change(),
            "Auto event started"
        );

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break ExecutorOutcome::Cancelled,
                _ = ticker.tick() => match self.tick(&ctx).await {
                    TickOutcome::Stopped => break ExecutorOutcome::Stopped,
                    TickOutcome::Locked => break ExecutorOutcome::Locked,
                    _ => {}
                },
            }
        };
        self.running.store(false, Ordering::SeqCst);

        debug!(
            device = %self.spec.device_name(),
            resource = %self.spec.resource_name(),
            outcome = ?outcome,
            "Auto event finished"
        );
        outcome
    }

    /// Execute one tick.
    pub async fn tick(&self, ctx: &ExecutorContext) -> TickOutcome {
        let device = self.spec.device_name();
        let resource = self.spec.resource_name();

        if self.is_stopped() {
            return TickOutcome::Stopped;
        }

        if ctx.lock_state.is_locked() {
            info!(device = %device, resource = %resource, "Auto event stopped for locked device service");
            return TickOutcome::Locked;
        }

        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            device = %device,
            resource = %resource,
            correlation_id = %correlation_id,
            "Auto event executing"
        );

        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        let event = match ctx.reader.read(device, resource, &correlation_id).await {
            Ok(event) => event,
            Err(e) => {
                self.counters.read_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    device = %device,
                    resource = %resource,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Auto event failed to read resource"
                );
                return TickOutcome::ReadFailed;
            }
        };

        if event.is_empty() {
            self.counters.empty.fetch_add(1, Ordering::Relaxed);
            debug!(device = %device, resource = %resource, "Auto event produced no readings");
            return TickOutcome::Empty;
        }

        if let Some(filter) = &self.filter
            && filter.should_suppress(&event.readings)
        {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(
                device = %device,
                resource = %resource,
                correlation_id = %correlation_id,
                "Auto event readings unchanged, skipping publish"
            );
            return TickOutcome::Suppressed;
        }

        self.dispatch(ctx, event, correlation_id);
        TickOutcome::Dispatched
    }

    /// Publish on a detached task. Admission happens inside that task so a
    /// saturated limiter never stalls the timer loop.
    fn dispatch(&self, ctx: &ExecutorContext, event: Event, correlation_id: String) {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let limiter = ctx.limiter.clone();
        let publisher = ctx.publisher.clone();
        let key = self.spec.key().clone();

        ctx.dispatches.spawn(async move {
            let _permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(
                        schedule = %key,
                        correlation_id = %correlation_id,
                        error = %e,
                        "Dropping auto event, dispatch limiter unavailable"
                    );
                    return;
                }
            };

            if event.has_binary_value() {
                debug!(schedule = %key, correlation_id = %correlation_id, "Pushing binary event");
            } else {
                debug!(
                    schedule = %key,
                    correlation_id = %correlation_id,
                    readings = event.readings.len(),
                    "Pushing event"
                );
            }

            if let Err(e) = publisher.publish(&event, &correlation_id).await {
                error!(
                    schedule = %key,
                    correlation_id = %correlation_id,
                    error = %e,
                    "Failed to publish auto event"
                );
            }
        });
    }
}
