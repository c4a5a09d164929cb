//! The two ways a task reports its single result: an error-first callback or
//! a future.

use futures::channel::oneshot;
use setpool_error::{Error, Result};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::error;

/// Receives the result of exactly one task. Consuming `self` makes a second
/// delivery unrepresentable.
pub trait CompletionSink<T>: Send {
    fn complete(self: Box<Self>, result: Result<T>);
}

/// A user completion callback, called with the task's result.
pub type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

pub struct CallbackSink<T> {
    callback: Callback<T>,
}

impl<T> CallbackSink<T> {
    pub fn new(callback: Callback<T>) -> Self {
        Self { callback }
    }
}

impl<T: Send> CompletionSink<T> for CallbackSink<T> {
    fn complete(self: Box<Self>, result: Result<T>) {
        let callback = self.callback;
        if catch_unwind(AssertUnwindSafe(move || callback(result))).is_err() {
            // The result has already been handed over, nothing to redeliver.
            error!("completion callback panicked");
        }
    }
}

pub struct FutureSink<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T: Send> FutureSink<T> {
    /// A sink and the future it settles.
    pub fn channel() -> (Self, TaskFuture<T>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, TaskFuture { receiver })
    }
}

impl<T: Send> CompletionSink<T> for FutureSink<T> {
    fn complete(self: Box<Self>, result: Result<T>) {
        // A dropped future means nobody is waiting for the result.
        let _ = self.sender.send(result);
    }
}

/// Resolves with the task's result once the host loop has delivered it.
///
/// A task dropped without ever completing, for example because its host loop
/// went away, resolves with an [`Error::AsyncInfrastructure`].
#[must_use = "a TaskFuture does nothing unless polled or taken"]
pub struct TaskFuture<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> TaskFuture<T> {
    /// Returns the result if it has already been delivered.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(dropped_error())),
        }
    }
}

impl<T> Future for TaskFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(dropped_error())),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn dropped_error() -> Error {
    Error::AsyncInfrastructure(String::from("task was dropped before completing"))
}
