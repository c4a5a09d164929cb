//! Host value boundary.
//!
//! Dynamic host values are resolved once into a [`SetSource`] before any set
//! is touched, so shape errors never leave a partial mutation behind.

use crate::engine::SetEngine;
use crate::handle::SetHandle;
use roaring::RoaringBitmap;
use setpool_error::{Error, Result};

/// A dynamically typed value handed over by the host runtime.
#[derive(Debug)]
pub enum HostValue<'a, E: SetEngine = RoaringBitmap> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Uint32Array(&'a [u32]),
    /// Reinterpreted bit for bit as `u32`.
    Int32Array(&'a [i32]),
    Array(&'a [HostValue<'a, E>]),
    Set(&'a SetHandle<E>),
}

impl<'a, E: SetEngine> HostValue<'a, E> {
    pub fn as_set(&self) -> Option<&'a SetHandle<E>> {
        match self {
            HostValue::Set(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Resolves an integer-sequence argument. `context` names the operation
    /// in the error.
    pub fn resolve(&self, context: &'static str) -> Result<SetSource<'a, E>> {
        match self {
            HostValue::Set(handle) => Ok(SetSource::Set(*handle)),
            HostValue::Uint32Array(values) => Ok(SetSource::Buffer(*values)),
            HostValue::Int32Array(values) => Ok(SetSource::Sequence(
                values.iter().map(|&v| v as u32).collect(),
            )),
            HostValue::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| match item {
                        HostValue::Number(n) => Ok(to_uint32(*n)),
                        _ => Err(Error::argument_type(
                            context,
                            "array elements must be numbers",
                        )),
                    })
                    .collect::<Result<Vec<u32>>>()?;
                Ok(SetSource::Sequence(values))
            }
            _ => Err(Error::argument_type(
                context,
                "Uint32Array, set handle or array of numbers expected",
            )),
        }
    }
}

/// Converts a number to `u32` with wrap-around, mapping NaN and infinities
/// to 0.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// A resolved integer-sequence argument.
#[derive(Debug)]
pub enum SetSource<'a, E: SetEngine = RoaringBitmap> {
    Set(&'a SetHandle<E>),
    Buffer(&'a [u32]),
    Sequence(Vec<u32>),
}

impl<E: SetEngine> SetSource<'_, E> {
    /// The raw values, unless the source is a set.
    pub fn values(&self) -> Option<&[u32]> {
        match self {
            SetSource::Set(_) => None,
            SetSource::Buffer(values) => Some(values),
            SetSource::Sequence(values) => Some(values),
        }
    }
}

/// Anything accepted where an integer sequence is expected.
pub trait IntoSetSource<'a, E: SetEngine> {
    fn into_set_source(self, context: &'static str) -> Result<SetSource<'a, E>>;
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for SetSource<'a, E> {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(self)
    }
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for &'a SetHandle<E> {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(SetSource::Set(self))
    }
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for &'a [u32] {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(SetSource::Buffer(self))
    }
}

impl<'a, E: SetEngine, const N: usize> IntoSetSource<'a, E> for &'a [u32; N] {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(SetSource::Buffer(self.as_slice()))
    }
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for &'a Vec<u32> {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(SetSource::Buffer(self.as_slice()))
    }
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for Vec<u32> {
    fn into_set_source(self, _: &'static str) -> Result<SetSource<'a, E>> {
        Ok(SetSource::Sequence(self))
    }
}

impl<'a, E: SetEngine> IntoSetSource<'a, E> for &HostValue<'a, E> {
    fn into_set_source(self, context: &'static str) -> Result<SetSource<'a, E>> {
        self.resolve(context)
    }
}
