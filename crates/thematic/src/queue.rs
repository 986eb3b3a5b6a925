//! Bounded queue for blocking render jobs.
//!
//! Rendering engines are synchronous and call back into the importer, which
//! for async transforms performs its reads through `tokio::fs`. Those reads
//! also run on the blocking pool. With a pool of `n` threads the queue admits
//! at most `n - 1` renders at once, so one blocking thread is always free
//! for an importer read and a full pool of renders cannot deadlock waiting
//! on their own imports.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::RenderJobError;

/// Runs blocking render jobs with bounded concurrency.
#[derive(Debug, Clone)]
pub struct RenderQueue {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl RenderQueue {
    /// Creates a queue for a blocking pool of `thread_pool_size` threads.
    pub fn new(thread_pool_size: usize) -> Self {
        let capacity = thread_pool_size.saturating_sub(1).max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of concurrent jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs that could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a slot, then runs `job` on the blocking pool.
    pub async fn run<F, T>(&self, job: F) -> Result<T, RenderJobError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RenderJobError::Closed)?;
        tracing::trace!(available = self.available(), "render job started");
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_capacity_reserves_one_thread() {
        assert_eq!(RenderQueue::new(4).capacity(), 3);
        assert_eq!(RenderQueue::new(2).capacity(), 1);
    }

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let queue = RenderQueue::new(4);
        assert_eq!(queue.run(|| 40 + 2).await.unwrap(), 42);
        assert_eq!(queue.available(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrency_is_bounded() {
        let queue = RenderQueue::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let queue = queue.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queue
                    .run(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
