//! The originating thread's completion queue.
//!
//! Pool threads never touch a completion sink directly. They post closures
//! through a [`LoopHandle`] and the thread owning the [`HostLoop`] runs them
//! when it drives the loop, so every finalize step and every callback runs on
//! the thread that scheduled the work.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, trace};

type Message = Box<dyn FnOnce() + Send>;

pub struct HostLoop {
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    outstanding: Arc<AtomicUsize>,
    // Pins the loop to the thread that created it.
    _origin: PhantomData<*const ()>,
}

impl Default for HostLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoop {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            outstanding: Arc::new(AtomicUsize::new(0)),
            _origin: PhantomData,
        }
    }

    /// A cloneable, thread-safe handle for posting back to this loop.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Number of scheduled tasks whose completion has not been delivered.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Runs every message already queued without waiting for more.
    /// Returns how many were run.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.receiver.try_recv() {
            dispatch(message);
            count += 1;
        }
        count
    }

    /// Blocks until every outstanding task has delivered its completion.
    pub fn run(&self) {
        while self.outstanding() > 0 {
            match self.receiver.recv() {
                Ok(message) => dispatch(message),
                // Unreachable while the loop holds its own sender.
                Err(_) => break,
            }
        }
    }

    /// Like [`HostLoop::run`] but gives up after `timeout`. Returns whether
    /// the loop became idle in time.
    pub fn run_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.outstanding() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => dispatch(message),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        true
    }
}

fn dispatch(message: Message) {
    if catch_unwind(AssertUnwindSafe(message)).is_err() {
        error!("host loop message panicked");
    }
}

#[derive(Clone)]
pub struct LoopHandle {
    sender: Sender<Message>,
    outstanding: Arc<AtomicUsize>,
}

impl LoopHandle {
    /// Marks one task as outstanding until the returned token is dropped.
    pub fn begin(&self) -> Pending {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        Pending {
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Queues `f` to run on the loop thread. Returns false when the loop is
    /// gone, in which case `f` is dropped without running.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(f)).is_err() {
            trace!("host loop is gone, dropping message");
            return false;
        }
        true
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("outstanding", &self.outstanding.load(Ordering::Relaxed))
            .finish()
    }
}

/// Keeps a task counted as outstanding. Dropped after its completion has
/// been delivered.
#[derive(Debug)]
pub struct Pending {
    outstanding: Arc<AtomicUsize>,
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
