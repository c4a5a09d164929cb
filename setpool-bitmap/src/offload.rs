//! Set operations run on the background pool.
//!
//! Each function schedules its work through a [`Dispatcher`]. When a
//! callback is given it receives the result and `None` is returned,
//! otherwise the returned [`TaskFuture`] does.
//!
//! Handles shared with a background operation are passed as `Arc` and only
//! read; the caller must not mutate them while the operation runs.

use crate::algebra::{self, BinaryOp};
use crate::handle::SetHandle;
use setpool_dispatch::{Callback, Dispatcher, ParallelTask, Task, TaskFuture};
use setpool_error::{Error, Result};
use std::sync::{Arc, OnceLock};

fn missing_result(context: &str) -> Error {
    Error::Task(format!("{}: work finished without a result", context))
}

struct FromValuesTask {
    values: Vec<u32>,
    result: Option<SetHandle>,
}

impl Task for FromValuesTask {
    type Output = SetHandle;

    fn work(&mut self) -> Result<()> {
        let mut handle = SetHandle::try_new()?;
        handle.add_many(&self.values)?;
        self.result = Some(handle);
        Ok(())
    }

    fn finalize(self) -> Result<SetHandle> {
        self.result.ok_or_else(|| missing_result("from_values"))
    }
}

/// Builds a set from `values` on the pool.
pub fn from_values_async(
    dispatcher: &Dispatcher,
    values: Vec<u32>,
    callback: Option<Callback<SetHandle>>,
) -> Option<TaskFuture<SetHandle>> {
    dispatcher.schedule(
        FromValuesTask {
            values,
            result: None,
        },
        callback,
    )
}

struct DeserializeTask {
    bytes: Vec<u8>,
    result: Option<SetHandle>,
}

impl Task for DeserializeTask {
    type Output = SetHandle;

    fn work(&mut self) -> Result<()> {
        self.result = Some(SetHandle::deserialize(&self.bytes)?);
        Ok(())
    }

    fn finalize(self) -> Result<SetHandle> {
        self.result.ok_or_else(|| missing_result("deserialize"))
    }
}

pub fn deserialize_async(
    dispatcher: &Dispatcher,
    bytes: Vec<u8>,
    callback: Option<Callback<SetHandle>>,
) -> Option<TaskFuture<SetHandle>> {
    dispatcher.schedule(
        DeserializeTask {
            bytes,
            result: None,
        },
        callback,
    )
}

struct DeserializeParallelTask {
    buffers: Vec<Vec<u8>>,
    slots: Vec<OnceLock<SetHandle>>,
    concurrency: u32,
}

impl ParallelTask for DeserializeParallelTask {
    type Output = Vec<SetHandle>;

    fn loop_count(&self) -> u32 {
        u32::try_from(self.buffers.len()).unwrap_or(u32::MAX)
    }

    fn concurrency(&self) -> u32 {
        self.concurrency
    }

    fn setup(&mut self) -> Result<()> {
        if u32::try_from(self.buffers.len()).is_err() {
            return Err(Error::argument_type(
                "deserialize_parallel",
                "too many buffers",
            ));
        }
        self.slots = (0..self.buffers.len()).map(|_| OnceLock::new()).collect();
        Ok(())
    }

    fn run_index(&self, index: u32) -> Result<()> {
        let index = index as usize;
        let handle = SetHandle::deserialize(&self.buffers[index])?;
        // Each index is claimed once, so the slot is still empty.
        let _ = self.slots[index].set(handle);
        Ok(())
    }

    fn finalize(self) -> Result<Vec<SetHandle>> {
        self.slots
            .into_iter()
            .map(|slot| slot.into_inner().ok_or_else(|| missing_result("deserialize_parallel")))
            .collect()
    }
}

/// Deserializes every buffer, fanning out across up to `concurrency`
/// threads (0 for one per CPU). The result keeps the order of `buffers`.
pub fn deserialize_parallel_async(
    dispatcher: &Dispatcher,
    buffers: Vec<Vec<u8>>,
    concurrency: u32,
    callback: Option<Callback<Vec<SetHandle>>>,
) -> Option<TaskFuture<Vec<SetHandle>>> {
    dispatcher.schedule_parallel(
        DeserializeParallelTask {
            buffers,
            slots: Vec::new(),
            concurrency,
        },
        callback,
    )
}

struct BinaryTask {
    op: BinaryOp,
    a: Arc<SetHandle>,
    b: Arc<SetHandle>,
    result: Option<SetHandle>,
}

impl Task for BinaryTask {
    type Output = SetHandle;

    fn work(&mut self) -> Result<()> {
        self.result = Some(self.op.apply(&*self.a, &*self.b)?);
        Ok(())
    }

    fn finalize(self) -> Result<SetHandle> {
        self.result.ok_or_else(|| missing_result(self.op.name()))
    }
}

/// Computes `a op b` on the pool.
pub fn binary_async(
    dispatcher: &Dispatcher,
    op: BinaryOp,
    a: Arc<SetHandle>,
    b: Arc<SetHandle>,
    callback: Option<Callback<SetHandle>>,
) -> Option<TaskFuture<SetHandle>> {
    dispatcher.schedule(
        BinaryTask {
            op,
            a,
            b,
            result: None,
        },
        callback,
    )
}

struct OrManyTask {
    handles: Vec<Arc<SetHandle>>,
    result: Option<SetHandle>,
}

impl Task for OrManyTask {
    type Output = SetHandle;

    fn work(&mut self) -> Result<()> {
        let handles: Vec<&SetHandle> = self.handles.iter().map(Arc::as_ref).collect();
        self.result = Some(algebra::or_many(&handles)?);
        Ok(())
    }

    fn finalize(self) -> Result<SetHandle> {
        self.result.ok_or_else(|| missing_result("or_many"))
    }
}

pub fn or_many_async(
    dispatcher: &Dispatcher,
    handles: Vec<Arc<SetHandle>>,
    callback: Option<Callback<SetHandle>>,
) -> Option<TaskFuture<SetHandle>> {
    dispatcher.schedule(
        OrManyTask {
            handles,
            result: None,
        },
        callback,
    )
}

struct SerializeTask {
    handle: Arc<SetHandle>,
    bytes: Option<Vec<u8>>,
}

impl Task for SerializeTask {
    type Output = Vec<u8>;

    fn work(&mut self) -> Result<()> {
        self.bytes = Some(self.handle.serialize()?);
        Ok(())
    }

    fn finalize(self) -> Result<Vec<u8>> {
        self.bytes.ok_or_else(|| missing_result("serialize"))
    }
}

pub fn serialize_async(
    dispatcher: &Dispatcher,
    handle: Arc<SetHandle>,
    callback: Option<Callback<Vec<u8>>>,
) -> Option<TaskFuture<Vec<u8>>> {
    dispatcher.schedule(
        SerializeTask {
            handle,
            bytes: None,
        },
        callback,
    )
}
