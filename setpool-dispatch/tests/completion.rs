//! Integration tests for completion delivery across many concurrent tasks.

use futures::executor::block_on;
use setpool_dispatch::{Dispatcher, HostLoop, ParallelTask, PoolConfig, Task, WorkerPool};
use setpool_error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn dispatcher(host: &HostLoop, workers: usize) -> Dispatcher {
    let config = PoolConfig::default()
        .with_workers(workers)
        .with_thread_name("completion-test");
    let pool = Arc::new(WorkerPool::new(&config).expect("pool"));
    Dispatcher::with_pool(pool, host)
}

/// Counts how often each stage runs.
struct Probe {
    id: usize,
    work_calls: Arc<AtomicUsize>,
}

impl Task for Probe {
    type Output = usize;

    fn work(&mut self) -> Result<()> {
        self.work_calls.fetch_add(1, Ordering::SeqCst);
        if self.id % 7 == 0 {
            return Err(Error::Task(format!("probe {} failed", self.id)));
        }
        Ok(())
    }

    fn finalize(self) -> Result<usize> {
        Ok(self.id)
    }
}

#[test]
fn test_each_task_completes_exactly_once() {
    init_tracing();

    let host = HostLoop::new();
    let dispatcher = dispatcher(&host, 4);
    let work_calls = Arc::new(AtomicUsize::new(0));
    let delivered = Arc::new(Mutex::new(Vec::new()));

    for id in 0..200 {
        let delivered = Arc::clone(&delivered);
        dispatcher.spawn_with_callback(
            Probe {
                id,
                work_calls: Arc::clone(&work_calls),
            },
            Box::new(move |result| delivered.lock().unwrap().push((id, result))),
        );
    }

    assert!(host.run_timeout(Duration::from_secs(30)));
    assert_eq!(host.outstanding(), 0);
    assert_eq!(work_calls.load(Ordering::SeqCst), 200);

    let mut delivered = delivered.lock().unwrap().clone();
    delivered.sort_by_key(|(id, _)| *id);
    assert_eq!(delivered.len(), 200);

    for (id, result) in delivered {
        if id % 7 == 0 {
            assert_eq!(result, Err(Error::Task(format!("probe {} failed", id))));
        } else {
            assert_eq!(result, Ok(id));
        }
    }
}

struct Squares {
    values: Vec<Mutex<u64>>,
}

impl ParallelTask for Squares {
    type Output = u64;

    fn loop_count(&self) -> u32 {
        self.values.len() as u32
    }

    fn concurrency(&self) -> u32 {
        3
    }

    fn run_index(&self, index: u32) -> Result<()> {
        let mut value = self.values[index as usize].lock().unwrap();
        *value *= *value;
        Ok(())
    }

    fn finalize(self) -> Result<u64> {
        Ok(self
            .values
            .into_iter()
            .map(|v| v.into_inner().unwrap())
            .sum())
    }
}

#[test]
fn test_mixed_single_and_parallel_tasks() {
    init_tracing();

    let host = HostLoop::new();
    let dispatcher = dispatcher(&host, 3);

    let parallel: Vec<_> = (1..=5u64)
        .map(|n| {
            dispatcher.spawn_parallel(Squares {
                values: (1..=n * 10).map(Mutex::new).collect(),
            })
        })
        .collect();

    let calls = Arc::new(AtomicUsize::new(0));
    let single = dispatcher.spawn(Probe {
        id: 1,
        work_calls: Arc::clone(&calls),
    });

    assert!(host.run_timeout(Duration::from_secs(30)));

    for (n, future) in (1..=5u64).zip(parallel) {
        let count = n * 10;
        let expected = count * (count + 1) * (2 * count + 1) / 6;
        assert_eq!(block_on(future), Ok(expected));
    }
    assert_eq!(block_on(single), Ok(1));
}

#[test]
fn test_dropped_host_rejects_futures() {
    let host = HostLoop::new();
    let dispatcher = dispatcher(&host, 1);

    let future = dispatcher.spawn(Probe {
        id: 3,
        work_calls: Arc::new(AtomicUsize::new(0)),
    });
    drop(host);

    assert!(matches!(
        block_on(future),
        Err(Error::AsyncInfrastructure(_))
    ));
}
