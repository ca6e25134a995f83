//! Bounded worker pool.
//!
//! Jobs go through a bounded queue to a fixed set of worker threads. When the
//! queue is full, [`WorkerPool::submit`] blocks the caller until a worker
//! frees a slot, which pushes back on whoever produces the jobs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::error::IngestError;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` threads sharing a queue of `queue_capacity` jobs.
    pub fn new(name: &str, workers: usize, queue_capacity: usize) -> Result<Self, IngestError> {
        if workers == 0 {
            return Err(IngestError::InvalidConfig(
                "worker pool needs at least one worker".to_string(),
            ));
        }
        if queue_capacity == 0 {
            return Err(IngestError::InvalidConfig(
                "worker pool queue capacity must be greater than zero".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || work(receiver));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Closing the queue lets already spawned workers exit.
                    drop(sender);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(IngestError::WorkerSpawn(e));
                }
            }
        }
        debug!(
            "Worker pool {} started: {} workers, queue capacity {}",
            name, workers, queue_capacity
        );

        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        })
    }

    /// Queue `job`, blocking while the queue is full.
    pub fn submit<F>(&self, job: F) -> Result<(), IngestError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(IngestError::PoolClosed)?;

        match sender.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!("Worker pool {} is saturated, waiting for a free slot", self.name);
                sender.send(job).map_err(|_| IngestError::PoolClosed)
            }
            Err(TrySendError::Disconnected(_)) => Err(IngestError::PoolClosed),
        }
    }

    /// Whether [`WorkerPool::join`] has been called.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting jobs and wait for every queued job to finish.
    ///
    /// Must not be called from inside a job.
    pub fn join(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if workers.is_empty() {
            return;
        }
        for handle in workers {
            if handle.join().is_err() {
                error!("Worker of pool {} terminated abnormally", self.name);
            }
        }
        debug!("Worker pool {} drained", self.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

fn work(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        // Hold the lock only while waiting for a job, never while running it.
        let job = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = job else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(
                "Job panicked on worker {}",
                thread::current().name().unwrap_or("<unnamed>")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn test_rejects_empty_pool() {
        assert!(matches!(
            WorkerPool::new("test", 0, 4),
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorkerPool::new("test", 2, 0),
            Err(IngestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_join_runs_every_job() {
        let pool = WorkerPool::new("test-join", 3, 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert!(pool.is_closed());
    }

    #[test]
    fn test_submit_after_join_fails() {
        let pool = WorkerPool::new("test-closed", 1, 1).unwrap();
        pool.join();
        assert!(matches!(pool.submit(|| {}), Err(IngestError::PoolClosed)));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new("test-panic", 1, 4).unwrap();
        let (tx, rx) = channel();
        pool.submit(|| panic!("job failure")).unwrap();
        pool.submit(move || tx.send(42).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.join();
    }

    #[test]
    fn test_jobs_run_concurrently() {
        let pool = WorkerPool::new("test-parallel", 2, 2).unwrap();
        let (first_tx, first_rx) = channel::<()>();
        let (second_tx, second_rx) = channel::<()>();
        let (done_tx, done_rx) = channel::<bool>();
        let done_tx2 = done_tx.clone();

        // Each job waits on the other; a single worker would time out.
        pool.submit(move || {
            let _ = second_tx.send(());
            let met = first_rx.recv_timeout(Duration::from_secs(5)).is_ok();
            done_tx.send(met).unwrap();
        })
        .unwrap();
        pool.submit(move || {
            let _ = first_tx.send(());
            let met = second_rx.recv_timeout(Duration::from_secs(5)).is_ok();
            done_tx2.send(met).unwrap();
        })
        .unwrap();
        pool.join();

        let results: Vec<bool> = done_rx.try_iter().collect();
        assert_eq!(results, vec![true, true]);
    }
}
