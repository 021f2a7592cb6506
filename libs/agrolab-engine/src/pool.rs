// Caps how many sandbox workers run at once

use agrolab_common::config::Backpressure;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::GradeError;

/// FIFO-fair admission for grading requests
///
/// Requests beyond `max_concurrent` wait in arrival order, or are turned
/// away once too many are already waiting under `Backpressure::Reject`.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_concurrent: usize,
    backpressure: Backpressure,
}

/// Held for the lifetime of one sandbox
#[derive(Debug)]
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiter count even if the acquiring future is dropped
struct WaitingGuard(Arc<AtomicUsize>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    pub fn new(max_concurrent: usize, backpressure: Backpressure) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_concurrent,
            backpressure,
        }
    }

    pub async fn acquire(&self) -> Result<PoolPermit, GradeError> {
        if let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() {
            return Ok(PoolPermit { _permit: permit });
        }

        let already_waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(Arc::clone(&self.waiting));
        if let Backpressure::Reject { max_waiting } = self.backpressure {
            if already_waiting >= max_waiting {
                debug!(waiting = already_waiting, "pool saturated, rejecting");
                return Err(GradeError::Saturated {
                    waiting: already_waiting,
                });
            }
        }

        debug!(waiting = already_waiting + 1, "waiting for a sandbox slot");
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| GradeError::Saturated {
                waiting: self.waiting.load(Ordering::SeqCst),
            })?;
        Ok(PoolPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_are_capped_and_released() {
        let pool = WorkerPool::new(2, Backpressure::Queue);
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        let _c = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test]
    async fn test_queue_waits_in_order() {
        let pool = WorkerPool::new(1, Backpressure::Queue);
        let held = pool.acquire().await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for i in 0..3 {
            let waiter = pool.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = waiter.acquire().await.unwrap();
                tx.send(i).unwrap();
            });
            // let each waiter enqueue before the next
            while pool.waiting() <= i {
                tokio::task::yield_now().await;
            }
        }
        assert_eq!(pool.waiting(), 3);

        drop(held);
        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap());
        }
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(pool.waiting(), 0);
    }

    #[tokio::test]
    async fn test_reject_when_too_many_waiting() {
        let pool = WorkerPool::new(1, Backpressure::Reject { max_waiting: 1 });
        let _held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        while pool.waiting() < 1 {
            tokio::task::yield_now().await;
        }

        match pool.acquire().await {
            Err(GradeError::Saturated { waiting }) => assert_eq!(waiting, 1),
            other => panic!("expected saturation, got {:?}", other),
        }
        waiter.abort();
    }

    #[tokio::test]
    async fn test_cancelled_waiter_is_not_counted() {
        let pool = WorkerPool::new(1, Backpressure::Queue);
        let _held = pool.acquire().await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
        assert!(result.is_err());
        assert_eq!(pool.waiting(), 0);
    }
}
