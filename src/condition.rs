//! Predicates used by `Store::check`/preconditions to test a node's value
//! without mutating it.
//!
//! Translated from `original_source/node-conditions.h`'s `condition_helper`
//! CRTP mixin family into small structs implementing a shared [`Condition`]
//! trait, per spec.md §9(a): the original's compile-time mixins (which
//! specialize a condition over "missing means pass/fail" and "wrong type
//! means pass/fail") become runtime wrapper structs here.

use crate::node::{Node, NodeHandle};

/// A testable property of a (possibly absent) node handle.
pub trait Condition {
    /// `handle` is `None` when the addressed path is absent.
    fn test(&self, handle: &NodeHandle) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&NodeHandle) -> bool,
{
    fn test(&self, handle: &NodeHandle) -> bool {
        self(handle)
    }
}

/// Wraps `inner`, substituting a fixed outcome whenever the handle is
/// absent instead of delegating to `inner`. Mirrors
/// `condition_default_value` in the original source.
pub struct DefaultOnAbsent<C> {
    inner: C,
    default: bool,
}

impl<C: Condition> Condition for DefaultOnAbsent<C> {
    fn test(&self, handle: &NodeHandle) -> bool {
        if handle.is_none() {
            self.default
        } else {
            self.inner.test(handle)
        }
    }
}

pub fn default_on_absent<C: Condition>(inner: C, default: bool) -> DefaultOnAbsent<C> {
    DefaultOnAbsent { inner, default }
}

/// Wraps `inner`, returning `false` outright when the node is present but
/// not one of the scalar/container kinds `inner` expects, instead of
/// letting `inner` observe the mismatched value. Mirrors
/// `value_condition_type_restricted`.
pub struct TypeRestricted<C> {
    inner: C,
    allowed: fn(&Node) -> bool,
}

impl<C: Condition> Condition for TypeRestricted<C> {
    fn test(&self, handle: &NodeHandle) -> bool {
        match handle {
            Some(node) if !(self.allowed)(node) => false,
            _ => self.inner.test(handle),
        }
    }
}

pub fn type_restricted<C: Condition>(inner: C, allowed: fn(&Node) -> bool) -> TypeRestricted<C> {
    TypeRestricted { inner, allowed }
}

/// Negates `inner`'s result. Mirrors `condition_invert`.
pub struct Invert<C> {
    inner: C,
}

impl<C: Condition> Condition for Invert<C> {
    fn test(&self, handle: &NodeHandle) -> bool {
        !self.inner.test(handle)
    }
}

pub fn invert<C: Condition>(inner: C) -> Invert<C> {
    Invert { inner }
}

/// `handle`'s node equals `expected` (absent never equals anything).
pub fn equal(expected: Node) -> impl Condition {
    move |handle: &NodeHandle| matches!(handle, Some(node) if node.as_ref() == &expected)
}

pub fn not_equal(expected: Node) -> impl Condition {
    invert(equal(expected))
}

/// `handle`'s node is present and equal to one of `candidates`.
pub fn in_(candidates: Vec<Node>) -> impl Condition {
    move |handle: &NodeHandle| match handle {
        Some(node) => candidates.iter().any(|c| c == node.as_ref()),
        None => false,
    }
}

pub fn not_in(candidates: Vec<Node>) -> impl Condition {
    invert(in_(candidates))
}

/// `handle` holds an `Array` node.
pub fn is_array() -> impl Condition {
    |handle: &NodeHandle| matches!(handle, Some(node) if matches!(node.as_ref(), Node::Array(_)))
}

/// `handle` is absent. Strictly handle absence, not container emptiness or
/// `Null` — mirrors `is_empty_condition::operator()`'s `node == nullptr`
/// check in the original source, which a present `Null`/`[]`/`{}` does not
/// satisfy.
pub fn is_empty() -> impl Condition {
    |handle: &NodeHandle| handle.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::double_handle;

    #[test]
    fn equal_matches_value() {
        let cond = equal(Node::Double(1.0));
        assert!(cond.test(&double_handle(1.0)));
        assert!(!cond.test(&double_handle(2.0)));
        assert!(!cond.test(&None));
    }

    #[test]
    fn default_on_absent_overrides_missing() {
        let cond = default_on_absent(equal(Node::Double(1.0)), true);
        assert!(cond.test(&None));
        assert!(!cond.test(&double_handle(2.0)));
    }

    #[test]
    fn is_empty_is_strictly_absence() {
        let cond = is_empty();
        assert!(cond.test(&None));
        // A present `Null`/empty-container value is not "empty" — only the
        // absent handle is.
        assert!(!cond.test(&crate::node::null_handle()));
        assert!(!cond.test(&crate::node::empty_array_handle()));
        assert!(!cond.test(&crate::node::empty_object_handle()));
        assert!(!cond.test(&double_handle(0.0)));
    }
}
