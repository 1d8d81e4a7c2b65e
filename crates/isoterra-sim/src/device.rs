//! Host-side compute queue.
//!
//! A dispatch launches `invocations` independent kernel calls on a dedicated
//! thread pool and blocks the submitting thread until all of them report
//! back, bounded by the configured wait timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::DeviceError;

pub struct Device {
    pool: ThreadPool,
    wait_timeout: Duration,
}

impl Device {
    /// Build the executor. `worker_threads == 0` lets rayon pick.
    pub fn new(worker_threads: usize, wait_timeout: Duration) -> Result<Self, DeviceError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("isoterra-device-{i}"))
            .panic_handler(|_| log::error!("Device invocation panicked"))
            .build()?;
        log::info!(
            "Device: {} worker threads, {} ms wait bound",
            pool.current_num_threads(),
            wait_timeout.as_millis()
        );
        Ok(Self { pool, wait_timeout })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `kernel(0..invocations)` in parallel and wait for every call.
    ///
    /// Per-invocation errors are collected and returned; only a timeout or a
    /// lost invocation fails the dispatch itself. Invocations still running
    /// after a timeout finish in the background.
    pub fn dispatch<E, F>(
        &self,
        label: &str,
        invocations: usize,
        kernel: F,
    ) -> Result<Vec<E>, DeviceError>
    where
        E: Send + 'static,
        F: Fn(usize) -> Result<(), E> + Send + Sync + 'static,
    {
        if invocations == 0 {
            return Ok(Vec::new());
        }

        let kernel = Arc::new(kernel);
        let (done_tx, done_rx) = unbounded::<Result<(), E>>();
        for invocation in 0..invocations {
            let kernel = Arc::clone(&kernel);
            let done_tx = done_tx.clone();
            self.pool.spawn(move || {
                let _ = done_tx.send(kernel(invocation));
            });
        }
        drop(done_tx);

        let deadline = Instant::now() + self.wait_timeout;
        let mut failures = Vec::new();
        for completed in 0..invocations {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match done_rx.recv_timeout(remaining) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(DeviceError::WaitTimeout {
                        label: label.to_string(),
                        timeout_ms: self.wait_timeout.as_millis() as u64,
                        completed,
                        invocations,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DeviceError::Disconnected {
                        label: label.to_string(),
                        missing: invocations - completed,
                    });
                }
            }
        }

        log::trace!(
            "Dispatch '{}': {} invocations, {} failed",
            label,
            invocations,
            failures.len()
        );
        Ok(failures)
    }
}
