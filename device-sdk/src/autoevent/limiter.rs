//! Admission gate bounding concurrent publish operations.
//!
//! Every executor shares one [`DispatchLimiter`]. A publish task holds a
//! [`DispatchPermit`] for the whole duration of its network call, so the
//! number of publishes in flight never exceeds the configured capacity no
//! matter how many schedules tick at once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::{Error, Result};

/// Capacity-bounded admission gate (counting semaphore).
#[derive(Debug, Clone)]
pub struct DispatchLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted slot. The slot is released when the permit is dropped.
#[derive(Debug)]
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
}

impl DispatchLimiter {
    /// Create a limiter admitting at most `capacity` holders.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("dispatch limiter capacity must be at least 1"));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free slot.
    ///
    /// # Cancel Safety
    ///
    /// Dropping the future before it resolves consumes no slot.
    pub async fn acquire(&self) -> Result<DispatchPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("dispatch limiter is closed".to_string()))?;

        trace!(in_flight = self.in_flight(), capacity = self.capacity, "Dispatch slot acquired");
        Ok(DispatchPermit { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<DispatchPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| DispatchPermit { _permit: permit })
    }

    /// Refuse all pending and future acquisitions. Held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(DispatchLimiter::new(0), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_try_acquire_respects_capacity() {
        let limiter = DispatchLimiter::new(2).unwrap();
        let a = limiter.try_acquire().unwrap();
        let _b = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.in_flight(), 2);

        drop(a);
        assert_eq!(limiter.available(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_peak_concurrency_never_exceeds_capacity() {
        const CAPACITY: usize = 3;
        let limiter = DispatchLimiter::new(CAPACITY).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        let result =
            tokio::time::timeout(Duration::from_secs(5), futures::future::join_all(handles)).await;
        assert!(result.is_ok(), "Acquires should not deadlock");

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= CAPACITY, "peak {} exceeded capacity", peak);
        assert_eq!(peak, CAPACITY);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_when_holder_panics() {
        let limiter = DispatchLimiter::new(1).unwrap();
        let cloned = limiter.clone();
        let handle = tokio::spawn(async move {
            let _permit = cloned.acquire().await.unwrap();
            panic!("publish blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_acquire_cancel_safe() {
        let limiter = DispatchLimiter::new(1).unwrap();
        let held = limiter.acquire().await.unwrap();

        let cloned = limiter.clone();
        let waiter = tokio::spawn(async move { cloned.acquire().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        let _ = waiter.await;

        drop(held);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let limiter = DispatchLimiter::new(1).unwrap();
        let _held = limiter.acquire().await.unwrap();

        let cloned = limiter.clone();
        let waiter = tokio::spawn(async move { cloned.acquire().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        limiter.close();

        let result = waiter.await.unwrap();
        assert!(result.is_err());
        assert!(limiter.is_closed());
    }
}
