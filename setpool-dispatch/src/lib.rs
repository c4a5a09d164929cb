//! Background task dispatch with exactly-once completion.
//!
//! Work runs on a shared [`WorkerPool`]. Results travel back to the thread
//! that owns a [`HostLoop`] and are delivered there, once, to either a
//! callback or a [`TaskFuture`].
//!
//! ```no_run
//! use setpool_dispatch::{Dispatcher, HostLoop, Task};
//! use setpool_error::Result;
//!
//! struct Sum(Vec<u64>, u64);
//!
//! impl Task for Sum {
//!     type Output = u64;
//!
//!     fn work(&mut self) -> Result<()> {
//!         self.1 = self.0.iter().sum();
//!         Ok(())
//!     }
//!
//!     fn finalize(self) -> Result<u64> {
//!         Ok(self.1)
//!     }
//! }
//!
//! let host = HostLoop::new();
//! let dispatcher = Dispatcher::new(&host)?;
//! let mut total = dispatcher.spawn(Sum(vec![1, 2, 3], 0));
//! host.run();
//! assert_eq!(total.try_take(), Some(Ok(6)));
//! # Ok::<(), setpool_error::Error>(())
//! ```

pub mod config;
pub mod host;
pub mod parallel;
pub mod parallelism;
pub mod pool;
pub mod sink;
pub mod task;

pub use config::PoolConfig;
pub use host::{HostLoop, LoopHandle};
pub use parallel::ParallelTask;
pub use parallelism::{hardware_concurrency, resolve_concurrency};
pub use pool::WorkerPool;
pub use sink::{Callback, CompletionSink, TaskFuture};
pub use task::{Dispatcher, Task, TaskState};
