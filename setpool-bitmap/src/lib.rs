//! Owned compressed `u32` sets with in-place mutation, materializing algebra
//! and background offload.
//!
//! [`SetHandle`] wraps one container of a [`SetEngine`] (roaring by default).
//! Host values are normalized through [`HostValue`] and [`SetSource`] before
//! any set is mutated. [`algebra`] builds new sets from existing ones and
//! [`offload`] runs the heavy operations on a `setpool_dispatch` pool.

pub mod algebra;
pub mod engine;
pub mod handle;
pub mod offload;
pub mod range;
mod serialize;
pub mod source;

#[cfg(test)]
mod tests_algebra;

pub use algebra::{BinaryOp, and, and_not, or, or_many, or_many_values, swap, xor};
pub use engine::{SetEngine, SetStatistics};
pub use handle::SetHandle;
pub use range::{ClampedRange, RANGE_LIMIT};
pub use source::{HostValue, IntoSetSource, SetSource};
