//! Scheduler registry for tracking and managing auto-event executors.
//!
//! The `SchedulerRegistry` provides centralized management of executors:
//! - One executor per (device, resource) key, last registration wins
//! - Each executor runs on its own task under a child cancellation token
//! - Owns the dispatch limiter shared by every executor
//! - Coordinated shutdown that outlives no executor

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::{ExecutorContext, ExecutorOutcome, ScheduleExecutor};
use super::gateway::{LockState, PublishGateway, ReadGateway};
use super::limiter::DispatchLimiter;
use super::schedule::{ScheduleKey, ScheduleSpec};
use crate::config::{AutoEventConfig, SdkConfig};
use crate::{Error, Result};

/// Default time shutdown waits for in-flight publishes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A handle to a registered executor.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    executor: Arc<ScheduleExecutor>,
}

impl ExecutorHandle {
    pub fn key(&self) -> &ScheduleKey {
        self.executor.spec().key()
    }

    pub fn executor(&self) -> &Arc<ScheduleExecutor> {
        &self.executor
    }

    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }
}

/// Summary of a registry shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Executors that were joined.
    pub executors: usize,
    /// Executor tasks that panicked instead of returning.
    pub panicked: usize,
    /// Publish tasks still running when the grace period expired.
    pub abandoned_dispatches: usize,
}

struct RegisteredExecutor {
    executor: Arc<ScheduleExecutor>,
    cancellation_token: CancellationToken,
    task: JoinHandle<ExecutorOutcome>,
}

/// Registry owning every live schedule executor.
pub struct SchedulerRegistry {
    executors: HashMap<ScheduleKey, RegisteredExecutor>,
    context: ExecutorContext,
    /// Registry-owned token, child of the one passed at construction.
    cancellation_token: CancellationToken,
    shutdown_grace: Duration,
}

impl SchedulerRegistry {
    /// Create an empty registry whose executors stop when `parent` is cancelled.
    pub fn new(context: ExecutorContext, parent: &CancellationToken) -> Self {
        Self {
            executors: HashMap::new(),
            context,
            cancellation_token: parent.child_token(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Build the registry and its dispatch limiter from service configuration.
    pub fn from_config(
        config: &SdkConfig,
        reader: Arc<dyn ReadGateway>,
        publisher: Arc<dyn PublishGateway>,
        lock_state: Arc<dyn LockState>,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let limiter = DispatchLimiter::new(config.service.async_buffer_size)?;
        let context = ExecutorContext::new(reader, publisher, lock_state, limiter);
        Ok(Self::new(context, parent).with_shutdown_grace(config.service.shutdown_grace))
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn context(&self) -> &ExecutorContext {
        &self.context
    }

    pub fn limiter(&self) -> &DispatchLimiter {
        &self.context.limiter
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }

    pub fn contains(&self, device_name: &str, resource_name: &str) -> bool {
        self.executors
            .contains_key(&ScheduleKey::new(device_name, resource_name))
    }

    pub fn handle(&self, device_name: &str, resource_name: &str) -> Option<ExecutorHandle> {
        self.executors
            .get(&ScheduleKey::new(device_name, resource_name))
            .map(|entry| ExecutorHandle {
                executor: entry.executor.clone(),
            })
    }

    /// Get all registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &ScheduleKey> {
        self.executors.keys()
    }

    /// Start an executor for `spec`.
    ///
    /// An executor already registered under the same key is stopped and
    /// joined first. Its change-filter state is discarded.
    pub async fn register(&mut self, spec: ScheduleSpec) -> Result<ExecutorHandle> {
        if self.cancellation_token.is_cancelled() {
            return Err(Error::Other(format!(
                "cannot register {}: scheduler registry is shut down",
                spec.key()
            )));
        }

        if let Some(previous) = self.executors.remove(spec.key()) {
            info!(schedule = %spec.key(), "Replacing auto event executor");
            retire(spec.key(), previous).await;
        }

        Ok(self.spawn(ScheduleExecutor::new(spec)))
    }

    /// Parse `auto_event` and register it. Bad frequencies start nothing.
    pub async fn register_auto_event(
        &mut self,
        device_name: &str,
        auto_event: &AutoEventConfig,
    ) -> Result<ExecutorHandle> {
        let spec = ScheduleSpec::from_auto_event(device_name, auto_event)?;
        self.register(spec).await
    }

    /// Register every configured auto event, in configuration order.
    ///
    /// Invalid entries are logged and skipped; they do not affect the others.
    pub async fn register_all(&mut self, config: &SdkConfig) -> Vec<ExecutorHandle> {
        let mut handles = Vec::new();

        for device in &config.devices {
            for auto_event in &device.auto_events {
                match self.register_auto_event(&device.name, auto_event).await {
                    Ok(handle) => handles.push(handle),
                    Err(e) => warn!(
                        device = %device.name,
                        resource = %auto_event.resource,
                        error = %e,
                        "Skipping auto event"
                    ),
                }
            }
        }

        info!(count = handles.len(), "Auto events registered");
        handles
    }

    /// Stop and remove the executor behind `handle`.
    ///
    /// A stale handle, whose key now belongs to a newer executor, is ignored.
    pub async fn unregister(&mut self, handle: &ExecutorHandle) -> Option<ExecutorOutcome> {
        let is_current = self
            .executors
            .get(handle.key())
            .is_some_and(|entry| entry.executor.id() == handle.executor.id());

        if !is_current {
            debug!(schedule = %handle.key(), "Ignoring stale executor handle");
            return None;
        }

        self.unregister_key(handle.key()).await
    }

    pub async fn unregister_key(&mut self, key: &ScheduleKey) -> Option<ExecutorOutcome> {
        let entry = self.executors.remove(key)?;
        debug!(schedule = %key, "Removing auto event executor");
        retire(key, entry).await
    }

    /// Remove every schedule of a device, e.g. after the device was deleted.
    pub async fn unregister_device(&mut self, device_name: &str) -> usize {
        let keys: Vec<ScheduleKey> = self
            .executors
            .keys()
            .filter(|key| key.device_name == device_name)
            .cloned()
            .collect();

        for key in &keys {
            self.unregister_key(key).await;
        }
        keys.len()
    }

    /// Re-create executors whose loop already ended, e.g. after the device
    /// service was unlocked again. Returns how many were restarted.
    ///
    /// Executors ended through [`ScheduleExecutor::stop`] stay down.
    pub async fn revive_terminated(&mut self) -> usize {
        if self.cancellation_token.is_cancelled() {
            return 0;
        }

        let finished: Vec<ScheduleKey> = self
            .executors
            .iter()
            .filter(|(_, entry)| entry.task.is_finished() && !entry.executor.is_stopped())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &finished {
            if let Some(entry) = self.executors.remove(key) {
                let spec = entry.executor.spec().clone();
                retire(key, entry).await;
                info!(schedule = %key, "Restarting auto event executor");
                self.spawn(ScheduleExecutor::new(spec));
            }
        }

        finished.len()
    }

    /// Cancel every executor and wait for all of them to exit.
    ///
    /// Publishes already dispatched get `shutdown_grace` to finish; after
    /// that the limiter is closed so queued publishes give up.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        info!(count = self.executors.len(), "Shutting down auto events");
        self.cancellation_token.cancel();

        let entries: Vec<(ScheduleKey, RegisteredExecutor)> = self.executors.drain().collect();
        let mut report = ShutdownReport {
            executors: entries.len(),
            ..ShutdownReport::default()
        };

        let results = futures::future::join_all(
            entries
                .into_iter()
                .map(|(key, entry)| async move { (key, entry.task.await) }),
        )
        .await;

        for (key, result) in results {
            if let Err(e) = result {
                warn!(schedule = %key, error = %e, "Auto event task did not exit cleanly");
                report.panicked += 1;
            }
        }

        self.context.dispatches.close();
        if tokio::time::timeout(self.shutdown_grace, self.context.dispatches.wait())
            .await
            .is_err()
        {
            report.abandoned_dispatches = self.context.dispatches.len();
            warn!(
                pending = report.abandoned_dispatches,
                grace = ?self.shutdown_grace,
                "Shutdown grace expired with publishes still in flight"
            );
        }
        self.context.limiter.close();

        info!(executors = report.executors, "Auto events shut down");
        report
    }

    fn spawn(&mut self, executor: ScheduleExecutor) -> ExecutorHandle {
        let executor = Arc::new(executor);
        let key = executor.spec().key().clone();
        let cancellation_token = self.cancellation_token.child_token();

        debug!(
            schedule = %key,
            interval = ?executor.spec().interval(),
            "Spawning auto event executor"
        );

        let task = tokio::spawn({
            let executor = executor.clone();
            let context = self.context.clone();
            let token = cancellation_token.clone();
            async move { executor.run(context, token).await }
        });

        self.executors.insert(
            key,
            RegisteredExecutor {
                executor: executor.clone(),
                cancellation_token,
                task,
            },
        );

        ExecutorHandle { executor }
    }
}

impl Drop for SchedulerRegistry {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Stop, cancel and join one executor.
async fn retire(key: &ScheduleKey, entry: RegisteredExecutor) -> Option<ExecutorOutcome> {
    entry.executor.stop();
    entry.cancellation_token.cancel();

    match entry.task.await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(schedule = %key, error = %e, "Auto event task did not exit cleanly");
            None
        }
    }
}
