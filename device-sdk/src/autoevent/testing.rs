//! In-memory gateway fakes shared by the auto-event unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use device_contracts::{Event, ValueType};
use parking_lot::Mutex;

use super::{DispatchLimiter, ExecutorContext, LockState, PublishGateway, ReadGateway};
use crate::{Error, Result};

/// One scripted read result.
#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Scalar(&'static str),
    Binary(Vec<u8>),
    Empty,
    Fail,
}

/// Reader replaying a script; the last entry repeats once the script runs out.
pub(crate) struct ScriptedReader {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Scripted>,
    pub correlation_ids: Mutex<Vec<String>>,
}

impl ScriptedReader {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Scripted::Empty),
            correlation_ids: Mutex::new(Vec::new()),
        })
    }

    pub fn reads(&self) -> usize {
        self.correlation_ids.lock().len()
    }
}

#[async_trait]
impl ReadGateway for ScriptedReader {
    async fn read(&self, device_name: &str, resource_name: &str, correlation_id: &str) -> Result<Event> {
        self.correlation_ids.lock().push(correlation_id.to_string());

        let step = match self.script.lock().pop_front() {
            Some(step) => {
                *self.last.lock() = step.clone();
                step
            }
            None => self.last.lock().clone(),
        };

        let mut event = Event::new("test-profile", device_name, resource_name);
        match step {
            Scripted::Scalar(value) => {
                event.add_simple_reading(resource_name, ValueType::String, value)?
            }
            Scripted::Binary(bytes) => {
                event.add_binary_reading(resource_name, bytes, "application/octet-stream")
            }
            Scripted::Empty => {}
            Scripted::Fail => return Err(Error::read(device_name, resource_name, "device offline")),
        }
        Ok(event)
    }
}

/// Publisher recording every batch, optionally slow or failing.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub published: Mutex<Vec<(Event, String)>>,
    delay: Duration,
    fail: bool,
    current: AtomicUsize,
    pub peak: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl PublishGateway for RecordingPublisher {
    async fn publish(&self, event: &Event, correlation_id: &str) -> Result<()> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::Publish("ingestion unavailable".to_string()));
        }
        self.published
            .lock()
            .push((event.clone(), correlation_id.to_string()));
        Ok(())
    }
}

/// Lock state that flips to locked on the `locked_from`-th query.
pub(crate) struct LockAfter {
    queries: AtomicUsize,
    locked_from: usize,
}

impl LockAfter {
    pub fn new(locked_from: usize) -> Arc<Self> {
        Arc::new(Self {
            queries: AtomicUsize::new(0),
            locked_from,
        })
    }

    pub fn never() -> Arc<Self> {
        Self::new(usize::MAX)
    }
}

impl LockState for LockAfter {
    fn is_locked(&self) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst) + 1 >= self.locked_from
    }
}

pub(crate) fn context(
    reader: Arc<ScriptedReader>,
    publisher: Arc<RecordingPublisher>,
    lock_state: Arc<LockAfter>,
    capacity: usize,
) -> ExecutorContext {
    ExecutorContext::new(
        reader,
        publisher,
        lock_state,
        DispatchLimiter::new(capacity).expect("capacity is positive"),
    )
}
