//! Single-unit background tasks.
//!
//! A [`Task`] is set up on the scheduling thread, does its work on a pool
//! thread and is finalized back on the host loop, where its result is handed
//! to exactly one [`CompletionSink`].

use crate::host::{HostLoop, LoopHandle, Pending};
use crate::pool::{Job, WorkerPool};
use crate::sink::{Callback, CallbackSink, CompletionSink, FutureSink, TaskFuture};
use setpool_error::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, trace};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created = 0,
    Scheduled = 1,
    Running = 2,
    Completed = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Scheduled,
            2 => TaskState::Running,
            _ => TaskState::Completed,
        }
    }
}

/// Atomic holder of a [`TaskState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(TaskState::Created as u8))
    }

    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to`. Returns false if the current state is not `from`.
    pub fn advance(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Enters `Completed`. Only the first caller gets `true`.
    pub fn complete(&self) -> bool {
        self.0.swap(TaskState::Completed as u8, Ordering::AcqRel) != TaskState::Completed as u8
    }
}

/// One unit of background work.
pub trait Task: Send + 'static {
    type Output: Send + 'static;

    /// Runs on the scheduling thread before the task is queued. An error
    /// here skips `work` and is delivered as the task's result.
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs on a pool thread.
    fn work(&mut self) -> Result<()>;

    /// Runs on the host loop after `work` succeeded and produces the value
    /// handed to the completion sink.
    fn finalize(self) -> Result<Self::Output>;
}

struct SingleJob<T: Task> {
    task: T,
    error: Option<Error>,
    state: StateCell,
    sink: Box<dyn CompletionSink<T::Output>>,
    completions: LoopHandle,
    pending: Pending,
}

impl<T: Task> SingleJob<T> {
    fn record(&mut self, error: Error) {
        // First error wins.
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn post_completion(self: Box<Self>) {
        let completions = self.completions.clone();
        completions.post(move || self.complete());
    }

    fn complete(self: Box<Self>) {
        let job = *self;
        job.state.complete();

        let SingleJob {
            task,
            error,
            sink,
            pending,
            ..
        } = job;

        let result = match error {
            Some(error) => Err(error),
            None => match catch_unwind(AssertUnwindSafe(move || task.finalize())) {
                Ok(result) => result,
                Err(payload) => Err(Error::from_panic(payload, Error::UserCallback)),
            },
        };

        trace!("delivering task result, ok={}", result.is_ok());
        sink.complete(result);
        drop(pending);
    }
}

impl<T: Task> Job for SingleJob<T> {
    fn run(mut self: Box<Self>) {
        self.state.advance(TaskState::Scheduled, TaskState::Running);

        if self.error.is_none() {
            match catch_unwind(AssertUnwindSafe(|| self.task.work())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.record(e),
                Err(payload) => self.record(Error::from_panic(payload, Error::AsyncInfrastructure)),
            }
        }

        self.post_completion();
    }

    fn abandon(mut self: Box<Self>, error: Error) {
        self.record(error);
        self.post_completion();
    }
}

/// Schedules tasks on a pool and delivers their results on a host loop.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    completions: LoopHandle,
}

impl Dispatcher {
    /// A dispatcher on the process-wide pool.
    pub fn new(host: &HostLoop) -> Result<Self> {
        Ok(Self::with_pool(WorkerPool::shared()?, host))
    }

    pub fn with_pool(pool: Arc<WorkerPool>, host: &HostLoop) -> Self {
        Self {
            pool,
            completions: host.handle(),
        }
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub(crate) fn completions(&self) -> &LoopHandle {
        &self.completions
    }

    /// Schedules `task`. With a callback the result goes to the callback and
    /// `None` is returned, otherwise the returned future receives it.
    pub fn schedule<T: Task>(
        &self,
        task: T,
        callback: Option<Callback<T::Output>>,
    ) -> Option<TaskFuture<T::Output>> {
        match callback {
            Some(callback) => {
                self.spawn_with_callback(task, callback);
                None
            }
            None => Some(self.spawn(task)),
        }
    }

    pub fn spawn<T: Task>(&self, task: T) -> TaskFuture<T::Output> {
        let (sink, future) = FutureSink::channel();
        self.dispatch(task, Box::new(sink));
        future
    }

    pub fn spawn_with_callback<T: Task>(&self, task: T, callback: Callback<T::Output>) {
        self.dispatch(task, Box::new(CallbackSink::new(callback)));
    }

    pub(crate) fn dispatch<T: Task>(&self, mut task: T, sink: Box<dyn CompletionSink<T::Output>>) {
        let state = StateCell::new();
        state.advance(TaskState::Created, TaskState::Scheduled);

        let error = task.setup().err();
        if let Some(e) = &error {
            debug!("task setup failed, work will be skipped: {}", e);
        }

        let job = Box::new(SingleJob {
            task,
            error,
            state,
            sink,
            pending: self.completions.begin(),
            completions: self.completions.clone(),
        });

        if let Err(rejected) = self.pool.submit(job) {
            debug!("task was not queued: {}", rejected.error);
            rejected.job.abandon(rejected.error);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.pool.size())
            .field("completions", &self.completions)
            .finish()
    }
}
