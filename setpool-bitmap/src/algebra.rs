//! Materializing set operations. Inputs are never mutated; every result is a
//! new handle owning a freshly built container.

use crate::engine::SetEngine;
use crate::handle::SetHandle;
use crate::source::HostValue;
use setpool_error::{Error, Result};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    AndNot,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::AndNot => "and_not",
        }
    }

    /// Computes `a op b` into a new handle. The result is copy-on-write if
    /// either input is.
    pub fn apply<E: SetEngine>(self, a: &SetHandle<E>, b: &SetHandle<E>) -> Result<SetHandle<E>> {
        let (a_set, b_set) = (a.container(), b.container());
        let container = match self {
            BinaryOp::And => a_set.try_intersection(b_set),
            BinaryOp::Or => a_set.try_union(b_set),
            BinaryOp::Xor => a_set.try_symmetric_difference(b_set),
            BinaryOp::AndNot => a_set.try_difference(b_set),
        }
        .ok_or(Error::allocation(self.name()))?;

        Ok(SetHandle::from_parts(
            container,
            a.copy_on_write() || b.copy_on_write(),
        ))
    }
}

pub fn and<E: SetEngine>(a: &SetHandle<E>, b: &SetHandle<E>) -> Result<SetHandle<E>> {
    BinaryOp::And.apply(a, b)
}

pub fn or<E: SetEngine>(a: &SetHandle<E>, b: &SetHandle<E>) -> Result<SetHandle<E>> {
    BinaryOp::Or.apply(a, b)
}

pub fn xor<E: SetEngine>(a: &SetHandle<E>, b: &SetHandle<E>) -> Result<SetHandle<E>> {
    BinaryOp::Xor.apply(a, b)
}

pub fn and_not<E: SetEngine>(a: &SetHandle<E>, b: &SetHandle<E>) -> Result<SetHandle<E>> {
    BinaryOp::AndNot.apply(a, b)
}

/// [`BinaryOp::apply`] on host values, both of which must be set handles.
pub fn binary_values<E: SetEngine>(
    op: BinaryOp,
    a: &HostValue<'_, E>,
    b: &HostValue<'_, E>,
) -> Result<SetHandle<E>> {
    let a = a
        .as_set()
        .ok_or(Error::argument_type(op.name(), "first argument must be a set handle"))?;
    let b = b
        .as_set()
        .ok_or(Error::argument_type(op.name(), "second argument must be a set handle"))?;
    op.apply(a, b)
}

/// Union of any number of handles.
///
/// No handles give an empty set and one handle gives a copy of it. Otherwise
/// the union is computed in a single engine call.
pub fn or_many<E: SetEngine>(handles: &[&SetHandle<E>]) -> Result<SetHandle<E>> {
    match handles {
        [] => SetHandle::try_new().map_err(|_| Error::allocation("or_many")),
        [single] => single.try_clone().map_err(|_| Error::allocation("or_many")),
        _ => {
            trace!("or_many over {} sets", handles.len());
            let containers: Vec<&E> = handles.iter().map(|h| h.container()).collect();
            let container = E::try_union_many(&containers).ok_or(Error::allocation("or_many"))?;
            let copy_on_write = handles.iter().any(|h| h.copy_on_write());
            Ok(SetHandle::from_parts(container, copy_on_write))
        }
    }
}

/// [`or_many`] on host values.
///
/// The handles may be passed as separate arguments or as a single array
/// argument. Every element is checked before any union is computed.
pub fn or_many_values<E: SetEngine>(args: &[HostValue<'_, E>]) -> Result<SetHandle<E>> {
    let items = match args {
        [HostValue::Array(items)] => *items,
        _ => args,
    };

    let handles = items
        .iter()
        .map(|item| {
            item.as_set()
                .ok_or(Error::argument_type("or_many", "accepts only set handles"))
        })
        .collect::<Result<Vec<_>>>()?;

    or_many(&handles)
}

/// Exchanges the contents and copy-on-write flags of two handles.
pub fn swap<E: SetEngine>(a: &mut SetHandle<E>, b: &mut SetHandle<E>) {
    std::mem::swap(a, b);
}
