//! Error types shared by the set handle, algebra and dispatcher crates.

use thiserror::Error;

/// Errors surfaced by synchronous set operations or through a task's
/// single completion channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Wrong shape or type of an input value. Raised before any mutation.
    #[error("{context}: {message}")]
    ArgumentType {
        context: &'static str,
        message: &'static str,
    },

    /// The set engine could not construct or materialize a container.
    #[error("{context}: failed to materialize a container")]
    Allocation { context: &'static str },

    /// The background pool did not accept or could not execute the work.
    #[error("Async infrastructure error: {0}")]
    AsyncInfrastructure(String),

    /// The user supplied finalize step failed.
    #[error("Completion handler failed: {0}")]
    UserCallback(String),

    /// A unit of work reported its own failure.
    #[error("Task failed: {0}")]
    Task(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn argument_type(context: &'static str, message: &'static str) -> Self {
        Error::ArgumentType { context, message }
    }

    pub fn allocation(context: &'static str) -> Self {
        Error::Allocation { context }
    }

    /// Builds an error from a caught panic payload.
    pub fn from_panic(
        payload: Box<dyn std::any::Any + Send>,
        wrap: fn(String) -> Error,
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("unknown panic payload")
        };

        wrap(message)
    }
}

/// A specialized Result type for setpool operations
pub type Result<T> = std::result::Result<T, Error>;
