//! Tasks whose work is a bounded index loop, partitioned across pool threads.
//!
//! Workers claim indices from a shared atomic cursor until the range is
//! exhausted or an error has been recorded. The last worker to report back
//! on the host loop completes the task.

use crate::host::{LoopHandle, Pending};
use crate::parallelism::resolve_concurrency;
use crate::pool::Job;
use crate::sink::{Callback, CallbackSink, CompletionSink, FutureSink, TaskFuture};
use crate::task::{Dispatcher, StateCell, Task, TaskState};
use parking_lot::Mutex;
use setpool_error::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// A task made of `loop_count` independent units addressed by index.
pub trait ParallelTask: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Size of the index domain `[0, loop_count)`.
    fn loop_count(&self) -> u32;

    /// Requested number of workers, 0 for one per CPU.
    fn concurrency(&self) -> u32 {
        0
    }

    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Executes one unit. Units may run in any order and on any thread.
    fn run_index(&self, index: u32) -> Result<()>;

    fn finalize(self) -> Result<Self::Output>;
}

/// Runs every index on one pool thread when fanning out is pointless.
struct Sequential<T>(T);

impl<T: ParallelTask> Task for Sequential<T> {
    type Output = T::Output;

    fn setup(&mut self) -> Result<()> {
        self.0.setup()
    }

    fn work(&mut self) -> Result<()> {
        for index in 0..self.0.loop_count() {
            self.0.run_index(index)?;
        }
        Ok(())
    }

    fn finalize(self) -> Result<T::Output> {
        self.0.finalize()
    }
}

struct Partition<T: ParallelTask> {
    task: T,
    loop_count: u32,
    claim_cursor: AtomicU32,
    pending_workers: AtomicI32,
    state: StateCell,
    error: OnceLock<Error>,
    sink: Mutex<Option<Box<dyn CompletionSink<T::Output>>>>,
    settlement: Mutex<Option<Pending>>,
}

impl<T: ParallelTask> Partition<T> {
    fn record(&self, error: Error) {
        // First error wins.
        let _ = self.error.set(error);
    }

    fn should_stop(&self) -> bool {
        self.error.get().is_some() || self.state.get() == TaskState::Completed
    }

    fn drain(&self) {
        self.state.advance(TaskState::Scheduled, TaskState::Running);

        while !self.should_stop() {
            let previous = self.claim_cursor.load(Ordering::Acquire);
            let index = self.claim_cursor.fetch_add(1, Ordering::AcqRel);

            // A cursor that wrapped around is exhausted too.
            if index >= self.loop_count || index < previous {
                break;
            }

            match catch_unwind(AssertUnwindSafe(|| self.task.run_index(index))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.record(e),
                Err(payload) => self.record(Error::from_panic(payload, Error::AsyncInfrastructure)),
            }
        }
    }
}

struct PartitionWorker<T: ParallelTask> {
    partition: Arc<Partition<T>>,
    completions: LoopHandle,
}

impl<T: ParallelTask> PartitionWorker<T> {
    fn report(self) {
        let PartitionWorker {
            partition,
            completions,
        } = self;
        completions.post(move || finish_worker(partition));
    }
}

impl<T: ParallelTask> Job for PartitionWorker<T> {
    fn run(self: Box<Self>) {
        self.partition.drain();
        self.report();
    }

    fn abandon(self: Box<Self>, error: Error) {
        self.partition.record(error);
        self.report();
    }
}

/// Runs on the host loop once per worker plus once for the scheduler.
fn finish_worker<T: ParallelTask>(partition: Arc<Partition<T>>) {
    if partition.state.get() == TaskState::Completed {
        return;
    }

    if partition.pending_workers.fetch_sub(1, Ordering::AcqRel) > 1 {
        return;
    }

    complete(partition);
}

fn complete<T: ParallelTask>(partition: Arc<Partition<T>>) {
    if !partition.state.complete() {
        return;
    }

    let sink = partition.sink.lock().take();
    let settlement = partition.settlement.lock().take();

    let result = match Arc::try_unwrap(partition) {
        Ok(partition) => match partition.error.into_inner() {
            Some(error) => Err(error),
            None => {
                let task = partition.task;
                match catch_unwind(AssertUnwindSafe(move || task.finalize())) {
                    Ok(result) => result,
                    Err(payload) => Err(Error::from_panic(payload, Error::UserCallback)),
                }
            }
        },
        Err(_) => Err(Error::AsyncInfrastructure(String::from(
            "parallel task completed while still shared",
        ))),
    };

    trace!("delivering parallel task result, ok={}", result.is_ok());
    if let Some(sink) = sink {
        sink.complete(result);
    }
    drop(settlement);
}

impl Dispatcher {
    /// Schedules a parallel task. Result delivery follows
    /// [`Dispatcher::schedule`].
    pub fn schedule_parallel<T: ParallelTask>(
        &self,
        task: T,
        callback: Option<Callback<T::Output>>,
    ) -> Option<TaskFuture<T::Output>> {
        match callback {
            Some(callback) => {
                self.dispatch_parallel(task, Box::new(CallbackSink::new(callback)));
                None
            }
            None => Some(self.spawn_parallel(task)),
        }
    }

    pub fn spawn_parallel<T: ParallelTask>(&self, task: T) -> TaskFuture<T::Output> {
        let (sink, future) = FutureSink::channel();
        self.dispatch_parallel(task, Box::new(sink));
        future
    }

    fn dispatch_parallel<T: ParallelTask>(
        &self,
        mut task: T,
        sink: Box<dyn CompletionSink<T::Output>>,
    ) {
        let loop_count = task.loop_count();
        let tasks_count = resolve_concurrency(task.concurrency()).min(loop_count);

        if tasks_count <= 1 {
            trace!("running {} units sequentially", loop_count);
            self.dispatch(Sequential(task), sink);
            return;
        }

        let state = StateCell::new();
        state.advance(TaskState::Created, TaskState::Scheduled);
        let error = OnceLock::new();
        if let Err(e) = task.setup() {
            debug!("parallel task setup failed, work will be skipped: {}", e);
            let _ = error.set(e);
        }

        // The scheduler holds one share until every worker is queued.
        let partition = Arc::new(Partition {
            task,
            loop_count,
            claim_cursor: AtomicU32::new(0),
            pending_workers: AtomicI32::new(1),
            state,
            error,
            sink: Mutex::new(Some(sink)),
            settlement: Mutex::new(Some(self.completions().begin())),
        });

        debug!(
            "fanning out {} units across {} workers",
            loop_count, tasks_count
        );

        for _ in 0..tasks_count {
            partition.pending_workers.fetch_add(1, Ordering::AcqRel);
            let worker = Box::new(PartitionWorker {
                partition: Arc::clone(&partition),
                completions: self.completions().clone(),
            });

            if let Err(rejected) = self.pool().submit(worker) {
                debug!("partition worker was not queued: {}", rejected.error);
                rejected.job.abandon(rejected.error);
                break;
            }
        }

        self.completions()
            .post(move || finish_worker(partition));
    }
}
