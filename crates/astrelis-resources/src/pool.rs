//! Loader worker threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use async_executor::Executor;
use futures_lite::future;

use crate::error::{AssetError, AssetResult};

/// A unit of blocking work run on a loader thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named threads that run submitted jobs.
///
/// Jobs are spawned onto a shared executor; idle workers park inside
/// `Executor::tick` until work arrives. Once
/// [`shutdown`](Self::shutdown) starts, submissions are refused; jobs already
/// running finish, jobs not yet started are dropped.
pub struct WorkerPool {
    executor: Arc<Executor<'static>>,
    threads: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Start a pool with `num_threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is 0.
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        assert!(num_threads > 0, "WorkerPool must have at least one thread");

        let executor = Arc::new(Executor::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut threads = Vec::with_capacity(num_threads);

        for i in 0..num_threads {
            let exec = executor.clone();
            let shutdown_flag = shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("astrelis-loader-{}", i))
                .spawn(move || {
                    while !shutdown_flag.load(Ordering::Acquire) {
                        future::block_on(exec.tick());
                    }
                })?;

            threads.push(handle);
        }

        tracing::debug!("WorkerPool started with {} threads", num_threads);

        Ok(Self {
            executor,
            threads,
            shutdown,
        })
    }

    /// Worker count leaving one core for the owning thread.
    pub fn default_thread_count() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    /// Queue `job` for execution on some worker.
    ///
    /// Fails with [`AssetError::PoolStopped`] once shutdown has started.
    pub fn submit(&self, job: Job) -> AssetResult<()> {
        if !self.is_running() {
            return Err(AssetError::PoolStopped);
        }

        self.executor.spawn(async move { job() }).detach();
        Ok(())
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// `false` once shutdown has started.
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting jobs and join every worker.
    ///
    /// Jobs in progress run to completion first. Calling this twice is a no-op.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            self.shutdown.store(true, Ordering::Release);
            return;
        }

        tracing::debug!("Shutting down WorkerPool with {} threads", self.threads.len());
        self.shutdown.store(true, Ordering::Release);

        // Wake every parked worker so it observes the flag
        for _ in 0..self.threads.len() {
            self.executor.spawn(async {}).detach();
        }

        for handle in self.threads.drain(..) {
            if let Err(e) = handle.join() {
                tracing::error!("Loader thread panicked: {:?}", e);
            }
        }

        tracing::debug!("WorkerPool shutdown complete");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads.len())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_runs_jobs_on_named_threads() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();

        for _ in 0..8 {
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                tx.send(name).unwrap();
            }))
            .unwrap();
        }

        for _ in 0..8 {
            let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert!(name.unwrap().starts_with("astrelis-loader-"));
        }
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        assert!(!pool.is_running());

        let result = pool.submit(Box::new(|| {}));
        assert!(matches!(result, Err(AssetError::PoolStopped)));

        // Idempotent
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_waits_for_running_job() {
        let mut pool = WorkerPool::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();

        let flag = done.clone();
        pool.submit(Box::new(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(50));
            flag.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_thread_count() {
        assert!(WorkerPool::default_thread_count() >= 1);
    }
}
