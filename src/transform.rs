//! Functions that compute a node's next value from its current one, applied
//! at a path via [`crate::node::Node::transform`].
//!
//! Translated from `original_source/node-operations.h`'s
//! `value_operator_adapter` family. `pop`/`shift` are no-create here
//! (absent stays absent) per spec.md §4.3, confirmed against scenario S4 —
//! this is the one place this crate deliberately departs from what the
//! original C++ does (it treats absent as `Null` first), because spec.md
//! is unambiguous and wins over the original source when the two disagree
//! (see `DESIGN.md`).

use crate::node::{empty_array_handle, Node, NodeHandle};
use std::sync::Arc;

/// Computes the next handle for a location from its current handle.
pub trait Transform {
    fn apply(&self, current: &NodeHandle) -> NodeHandle;
}

impl<F> Transform for F
where
    F: Fn(&NodeHandle) -> NodeHandle,
{
    fn apply(&self, current: &NodeHandle) -> NodeHandle {
        self(current)
    }
}

/// Wraps `inner`, passing absent straight through unchanged instead of
/// calling `inner`. Mirrors the no-create behavior spec.md §4.3 assigns to
/// `pop`/`shift`.
pub struct NoCreate<T> {
    inner: T,
}

impl<T: Transform> Transform for NoCreate<T> {
    fn apply(&self, current: &NodeHandle) -> NodeHandle {
        if current.is_none() {
            None
        } else {
            self.inner.apply(current)
        }
    }
}

pub fn no_create<T: Transform>(inner: T) -> NoCreate<T> {
    NoCreate { inner }
}

/// Wraps `inner`, leaving the node untouched when present but not one of
/// the kinds `inner` expects, instead of letting `inner` observe the
/// mismatched value.
pub struct TypeRestricted<T> {
    inner: T,
    allowed: fn(&Node) -> bool,
}

impl<T: Transform> Transform for TypeRestricted<T> {
    fn apply(&self, current: &NodeHandle) -> NodeHandle {
        match current {
            Some(node) if !(self.allowed)(node) => current.clone(),
            _ => self.inner.apply(current),
        }
    }
}

pub fn type_restricted<T: Transform>(inner: T, allowed: fn(&Node) -> bool) -> TypeRestricted<T> {
    TypeRestricted { inner, allowed }
}

/// Replaces the value outright, ignoring `current`.
pub fn set(value: NodeHandle) -> impl Transform {
    move |_: &NodeHandle| value.clone()
}

/// Deletes the value (equivalent to `set(None)`, kept as its own
/// operation since the transaction DSL names it separately).
pub fn remove() -> impl Transform {
    |_: &NodeHandle| None
}

/// Adds `delta` to the current numeric value, treating absent as zero
/// (increment is create-on-absent, per `increment_value_operator`).
pub fn increment(delta: f64) -> impl Transform {
    move |current: &NodeHandle| {
        let base = match current {
            Some(node) => node.as_double().unwrap_or(0.0),
            None => 0.0,
        };
        Some(Arc::new(Node::Double(base + delta)))
    }
}

/// Appends `value` to the end of an array; if `current` is absent or not an
/// array, produces a fresh single-element array `[value]` (`push_value_operator`'s
/// non-array fallback discards whatever was there rather than preserving it).
pub fn push(value: NodeHandle) -> impl Transform {
    move |current: &NodeHandle| {
        let mut items = match current {
            Some(node) => match node.as_array() {
                Some(v) => v.clone(),
                None => im::Vector::new(),
            },
            None => im::Vector::new(),
        };
        items.push_back(value.clone());
        Some(Arc::new(Node::Array(items)))
    }
}

/// Inserts `value` at the front of an array; if `current` is absent or not
/// an array, produces a fresh single-element array `[value]`, mirroring
/// [`push`]'s non-array fallback.
pub fn prepend(value: NodeHandle) -> impl Transform {
    move |current: &NodeHandle| {
        let mut items = match current {
            Some(node) => match node.as_array() {
                Some(v) => v.clone(),
                None => im::Vector::new(),
            },
            None => im::Vector::new(),
        };
        items.push_front(value.clone());
        Some(Arc::new(Node::Array(items)))
    }
}

/// Removes the last element of an array. No-create: absent stays absent.
/// On a non-array present value, returns the value unchanged. On an empty
/// array, returns the (still-empty) array unchanged.
pub fn pop() -> impl Transform {
    no_create(|current: &NodeHandle| match current {
        Some(node) => match node.as_array() {
            Some(items) => {
                let mut items = items.clone();
                items.pop_back();
                Some(Arc::new(Node::Array(items)))
            }
            None => current.clone(),
        },
        None => None,
    })
}

/// Removes the first element of an array. No-create, same edge-case
/// behavior as [`pop`] mirrored at the front.
pub fn shift() -> impl Transform {
    no_create(|current: &NodeHandle| match current {
        Some(node) => match node.as_array() {
            Some(items) => {
                let mut items = items.clone();
                items.pop_front();
                Some(Arc::new(Node::Array(items)))
            }
            None => current.clone(),
        },
        None => None,
    })
}

/// Removes the first element deep-equal to `value` from an array; a
/// non-array present value or an array with no matching element is
/// returned unchanged; absent stays absent.
pub fn erase(value: Node) -> impl Transform {
    move |current: &NodeHandle| match current {
        Some(node) => match node.as_array() {
            Some(items) => match items.iter().position(|item| {
                matches!(item, Some(n) if n.as_ref() == &value)
            }) {
                Some(index) => {
                    let mut items = items.clone();
                    items.remove(index);
                    Some(Arc::new(Node::Array(items)))
                }
                None => current.clone(),
            },
            None => current.clone(),
        },
        None => None,
    }
}
