//! Fixed-size background thread pool shared by all dispatchers.
//!
//! Jobs are pushed to a bounded channel with `try_send` and drained by the
//! pool threads. Submission never blocks the caller: when the queue is full
//! or closed the job is handed back inside [`Rejected`] so that its owner can
//! complete it with an error instead.

use crate::config::PoolConfig;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use setpool_error::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use tracing::{debug, error, trace, warn};

/// A unit of work accepted by the pool.
pub trait Job: Send + 'static {
    /// Runs on a pool thread.
    fn run(self: Box<Self>);

    /// Called instead of `run` when the pool refused the job.
    fn abandon(self: Box<Self>, error: Error);
}

/// A job the pool did not accept, together with the reason.
pub struct Rejected {
    pub job: Box<dyn Job>,
    pub error: Error,
}

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

pub struct WorkerPool {
    sender: Option<Sender<Box<dyn Job>>>,
    workers: Vec<JoinHandle<()>>,
}

static SHARED_POOL: OnceLock<Arc<WorkerPool>> = OnceLock::new();

impl WorkerPool {
    /// Spawns `config.workers` threads reading from a queue of
    /// `config.queue_capacity` jobs.
    pub fn new(config: &PoolConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = bounded::<Box<dyn Job>>(config.queue_capacity);

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.workers),
        };

        for id in 0..config.workers {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, id))
                .spawn(move || worker_loop(id, receiver))
                .map_err(|e| {
                    Error::AsyncInfrastructure(format!("Failed to spawn pool thread: {}", e))
                })?;
            pool.workers.push(handle);
        }

        debug!(
            "started worker pool: workers={}, queue_capacity={}",
            config.workers, config.queue_capacity
        );

        Ok(pool)
    }

    /// The process-wide pool, built on first use from the default
    /// configuration with environment overrides applied.
    pub fn shared() -> Result<Arc<WorkerPool>> {
        if let Some(pool) = SHARED_POOL.get() {
            return Ok(Arc::clone(pool));
        }

        let config = PoolConfig::default().with_env_overrides()?;
        let pool = Arc::new(WorkerPool::new(&config)?);

        // Losing the race drops our pool, the published one wins.
        let _ = SHARED_POOL.set(pool);
        SHARED_POOL.get().cloned().ok_or_else(|| {
            Error::AsyncInfrastructure(String::from("shared pool was not published"))
        })
    }

    /// Number of pool threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues a job without blocking.
    pub fn submit(&self, job: Box<dyn Job>) -> std::result::Result<(), Rejected> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(Rejected {
                job,
                error: Error::AsyncInfrastructure(String::from("worker pool is shut down")),
            });
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!("worker pool queue is full, rejecting job");
                Err(Rejected {
                    job,
                    error: Error::AsyncInfrastructure(String::from("worker pool queue is full")),
                })
            }
            Err(TrySendError::Disconnected(job)) => Err(Rejected {
                job,
                error: Error::AsyncInfrastructure(String::from("worker pool is shut down")),
            }),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets the threads finish what is queued and exit.
        drop(self.sender.take());

        let current = std::thread::current().id();
        for handle in self.workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker pool thread panicked during shutdown");
            }
        }

        debug!("worker pool stopped");
    }
}

fn worker_loop(id: usize, receiver: Receiver<Box<dyn Job>>) {
    while let Ok(job) = receiver.recv() {
        if catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
            error!("pool worker {} caught a panic escaping a job", id);
        }
    }

    trace!("pool worker {} exiting", id);
}
