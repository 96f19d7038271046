//! The persistent, structurally-shared document tree.
//!
//! A [`Node`] is immutable once built; every "mutation" (`set`, `overlay`,
//! `transform`) returns a new handle while leaving every previously observed
//! handle valid and unchanged (spec.md §8, invariant 1). This is the direct
//! translation of `original_source/node.h`/`node.cpp`'s recursive tree
//! algorithms into Rust, using `im`'s persistent containers for the
//! structural sharing that the C++ original achieves via its own refcounted
//! immutable node type.

use crate::path::Path;
use crate::wire::{Builder, Slice, WireError};
use im::{OrdMap, Vector};
use std::sync::Arc;

/// A handle to a node, or the absence of one.
///
/// `None` is "this location has no value" (absent); `Some(Arc::new(Node::Null))`
/// is an explicit `null`. Collapsing these into one nullable type (as the
/// C++ original's raw pointer does) would make "delete" and "set to null"
/// indistinguishable, so we keep them apart with `Option`, per Design Note §9.
pub type NodeHandle = Option<Arc<Node>>;

/// A document value: a leaf scalar or a container of child handles.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Double(f64),
    String(Arc<str>),
    Array(Vector<NodeHandle>),
    Object(OrdMap<Arc<str>, NodeHandle>),
}

/// Shorthand for building an explicit-null handle.
pub fn null_handle() -> NodeHandle {
    Some(Arc::new(Node::Null))
}

pub fn bool_handle(value: bool) -> NodeHandle {
    Some(Arc::new(Node::Bool(value)))
}

pub fn double_handle(value: f64) -> NodeHandle {
    Some(Arc::new(Node::Double(value)))
}

pub fn string_handle(value: impl Into<Arc<str>>) -> NodeHandle {
    Some(Arc::new(Node::String(value.into())))
}

pub fn empty_array_handle() -> NodeHandle {
    Some(Arc::new(Node::Array(Vector::new())))
}

pub fn empty_object_handle() -> NodeHandle {
    Some(Arc::new(Node::Object(OrdMap::new())))
}

impl Node {
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Node::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vector<NodeHandle>> {
        match self {
            Node::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&OrdMap<Arc<str>, NodeHandle>> {
        match self {
            Node::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Reads the handle at `path` starting from `root`, or `None` if any
    /// segment is absent, indexes past an array's end, or descends through
    /// a scalar. Mirrors `node_visitor_get` in the original source.
    pub fn get(root: &NodeHandle, path: &Path) -> NodeHandle {
        let Some((head, rest)) = path.split_head() else {
            return root.clone();
        };
        let Some(node) = root else {
            return None;
        };
        match node.as_ref() {
            Node::Object(map) => {
                let child = map.get(head.as_ref()).cloned().flatten();
                Node::get(&child, &rest)
            }
            Node::Array(items) => {
                let index: usize = match head.parse() {
                    Ok(i) => i,
                    Err(_) => return None,
                };
                let child = items.get(index).cloned().flatten();
                Node::get(&child, &rest)
            }
            _ => None,
        }
    }

    /// Writes `value` at `path`, creating intermediate containers as
    /// needed. `value == None` deletes the addressed entry (absent means
    /// delete, matching the C++ original's `node_set_visitor`).
    ///
    /// A numeric-looking segment only indexes into an Array when the node
    /// currently being descended *is already* an Array; every other case —
    /// absent, a scalar, or an Object — always creates/descends into an
    /// Object, regardless of whether the segment string happens to parse as
    /// a number (`node_at_path` in the original source unconditionally
    /// builds a `node_object`, and `node_object::set_impl` does a plain
    /// string-keyed assignment with no numeric handling at all). Only once
    /// already inside an Array does a numeric segment extend it — "dense-
    /// array extension" for indices past the current end, padding with
    /// explicit `Null` — while a non-numeric segment against an existing
    /// Array promotes it to an Object keyed by the stringified original
    /// indices (S6).
    pub fn set(root: &NodeHandle, path: &Path, value: NodeHandle) -> NodeHandle {
        let Some((head, rest)) = path.split_head() else {
            return value;
        };

        let existing_array = match root {
            Some(node) => node.as_array(),
            None => None,
        };

        if let Some(items) = existing_array {
            if let Ok(index) = head.parse::<usize>() {
                let mut items = items.clone();
                while items.len() <= index {
                    items.push_back(null_handle());
                }
                let child = items.get(index).cloned().flatten();
                let new_child = Node::set(&child, &rest, value);
                items.set(index, new_child);
                return Some(Arc::new(Node::Array(items)));
            }
            let mut map: OrdMap<Arc<str>, NodeHandle> = items
                .iter()
                .enumerate()
                .map(|(i, handle)| (Arc::from(i.to_string()), handle.clone()))
                .collect();
            let child = map.get(head.as_ref()).cloned().flatten();
            let new_child = Node::set(&child, &rest, value);
            match new_child {
                None => {
                    map.remove(head.as_ref());
                }
                some => {
                    map.insert(head, some);
                }
            }
            return Some(Arc::new(Node::Object(map)));
        }

        let mut map = match root {
            Some(node) => match node.as_ref() {
                Node::Object(m) => m.clone(),
                _ => OrdMap::new(),
            },
            None => OrdMap::new(),
        };
        let child = map.get(head.as_ref()).cloned().flatten();
        let new_child = Node::set(&child, &rest, value);
        match new_child {
            None => {
                map.remove(head.as_ref());
            }
            some => {
                map.insert(head, some);
            }
        }
        Some(Arc::new(Node::Object(map)))
    }

    /// Recursively merges `overlay` onto `base`: an explicit `null` in
    /// `overlay` replaces the value outright, `overlay` being absent at a
    /// key leaves `base`'s value untouched, two Object values merge
    /// key-by-key (recursing into shared keys), and two Array values extend
    /// `base` to `overlay`'s length (padding with `Null`) before replacing
    /// *wholesale*, element-by-element, wherever `overlay`'s slot is
    /// non-absent — array elements are not recursively merged, mirroring
    /// `node_array::overlay_impl`'s plain `result[i] = v` (only
    /// `node_object::overlay_impl` recurses, via `store->overlay(...)` on a
    /// shared key). Any other combination of kinds lets `overlay` win
    /// wholesale.
    pub fn overlay(base: &NodeHandle, overlay: &NodeHandle) -> NodeHandle {
        match (base, overlay) {
            (_, None) => base.clone(),
            (Some(base_node), Some(overlay_node)) => {
                match (base_node.as_ref(), overlay_node.as_ref()) {
                    (Node::Object(base_map), Node::Object(overlay_map)) => {
                        // A member of the overlay's map whose handle is the
                        // absent handle is a tombstone: "remove this key".
                        // This is the one place a committed Node's own
                        // invariant (map values are never the absent
                        // handle) is relaxed, since the overlay argument is
                        // a diff, not a committed tree.
                        let mut merged = base_map.clone();
                        for (key, overlay_child) in overlay_map.iter() {
                            match overlay_child {
                                None => {
                                    merged.remove(key);
                                }
                                Some(_) => {
                                    let base_child = base_map.get(key).cloned().flatten();
                                    let merged_child = Node::overlay(&base_child, overlay_child);
                                    merged.insert(key.clone(), merged_child);
                                }
                            }
                        }
                        Some(Arc::new(Node::Object(merged)))
                    }
                    (Node::Array(base_items), Node::Array(overlay_items)) => {
                        let mut merged = base_items.clone();
                        while merged.len() < overlay_items.len() {
                            merged.push_back(null_handle());
                        }
                        for (i, overlay_child) in overlay_items.iter().enumerate() {
                            if overlay_child.is_some() {
                                merged.set(i, overlay_child.clone());
                            }
                        }
                        Some(Arc::new(Node::Array(merged)))
                    }
                    _ => overlay.clone(),
                }
            }
            (None, some) => some.clone(),
        }
    }

    /// Applies a mutation function at `path`. The closure receives the
    /// current handle (`None` if absent) and returns the new handle;
    /// returning `None` deletes. This is the single entry point `Transform`
    /// implementations use (see [`crate::transform`]).
    pub fn transform(
        root: &NodeHandle,
        path: &Path,
        f: &dyn Fn(&NodeHandle) -> NodeHandle,
    ) -> NodeHandle {
        let current = Node::get(root, path);
        let next = f(&current);
        Node::set(root, path, next)
    }

    /// Applies an ordered sequence of `(path, transformation)` actions in
    /// turn, each computed against the tree left by the previous one.
    /// Behavior is undefined if one action's path prefixes another's in
    /// the same call (left undefined per spec, not guarded against here).
    pub fn transform_all(root: &NodeHandle, actions: &[(Path, &dyn Fn(&NodeHandle) -> NodeHandle)]) -> NodeHandle {
        let mut tree = root.clone();
        for (path, f) in actions {
            tree = Node::transform(&tree, path, *f);
        }
        tree
    }

    /// For each `(path, reducer)` in `actions`, folds
    /// `acc = combine(acc, reducer(get(path)))` in order, starting from
    /// `init`. Used to aggregate a transaction's preconditions (`combine`
    /// is logical AND, `init` is `true`, each reducer is a
    /// [`crate::condition::Condition::test`]).
    pub fn fold<R, B>(
        root: &NodeHandle,
        actions: &[(Path, R)],
        reducer: impl Fn(&R, &NodeHandle) -> B,
        combine: impl Fn(B, B) -> B,
        init: B,
    ) -> B {
        let mut acc = init;
        for (path, action) in actions {
            let value = reducer(action, &Node::get(root, path));
            acc = combine(acc, value);
        }
        acc
    }

    /// Builds an overlay diff that, when passed as the `overlay` argument
    /// to [`Node::overlay`], deletes whatever lives at `path` and leaves
    /// everything else untouched: a chain of single-key Objects down to a
    /// tombstone (the absent handle) at the leaf.
    pub fn tombstone_at(path: &Path) -> NodeHandle {
        match path.split_head() {
            None => None,
            Some((head, rest)) => {
                let child = Node::tombstone_at(&rest);
                let mut map = OrdMap::new();
                map.insert(head, child);
                Some(Arc::new(Node::Object(map)))
            }
        }
    }

    /// Returns an Object-rooted tree containing only the subtrees
    /// addressed by `paths`, each placed back at its original path.
    pub fn extract(root: &NodeHandle, paths: &[Path]) -> NodeHandle {
        let mut result = empty_object_handle();
        for path in paths {
            let value = Node::get(root, path);
            result = Node::set(&result, path, value);
        }
        result
    }

    /// Decodes a [`Slice`] into an owned `Node` tree.
    pub fn from_slice(slice: Slice<'_>) -> Result<NodeHandle, WireError> {
        if slice.is_none() {
            return Ok(None);
        }
        if slice.is_null() {
            return Ok(null_handle());
        }
        if slice.is_bool() {
            return Ok(bool_handle(slice.as_bool()?));
        }
        if slice.is_double() {
            return Ok(double_handle(slice.as_double()?));
        }
        if slice.is_string() {
            return Ok(string_handle(slice.as_str()?));
        }
        if slice.is_array() {
            let mut items = Vector::new();
            for element in slice.iter_array()? {
                items.push_back(Node::from_slice(element?)?);
            }
            return Ok(Some(Arc::new(Node::Array(items))));
        }
        if slice.is_object() {
            let mut map = OrdMap::new();
            for pair in slice.iter_object()? {
                let (key, value) = pair?;
                map.insert(Arc::from(key), Node::from_slice(value)?);
            }
            return Ok(Some(Arc::new(Node::Object(map))));
        }
        Err(WireError::UnknownTag(0xff))
    }

    /// Encodes this tree into `builder`, in object-key order (`OrdMap`'s
    /// iteration order), producing a representation isomorphic to the one
    /// `from_slice` would decode back into an identical tree.
    pub fn write_into(handle: &NodeHandle, builder: &mut Builder) {
        match handle {
            None => builder.append_null(),
            Some(node) => match node.as_ref() {
                Node::Null => builder.append_null(),
                Node::Bool(b) => builder.append_bool(*b),
                Node::Double(d) => builder.append_double(*d),
                Node::String(s) => builder.append_string(s),
                Node::Array(items) => {
                    builder.open_array();
                    for item in items.iter() {
                        Node::write_into(item, builder);
                    }
                    builder.close_array();
                }
                Node::Object(map) => {
                    builder.open_object();
                    for (key, value) in map.iter() {
                        builder.key(key);
                        Node::write_into(value, builder);
                    }
                    builder.close_object();
                }
            },
        }
    }

    /// Encodes this tree into a fresh [`Builder`], per spec.md §4.1's
    /// `into_builder`.
    pub fn into_builder(handle: &NodeHandle) -> Builder {
        let mut builder = Builder::new();
        Node::write_into(handle, &mut builder);
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_builds_object_rooted_tree_of_requested_paths() {
        let root = Node::set(&None, &Path::parse("a/x"), double_handle(1.0));
        let root = Node::set(&root, &Path::parse("a/y"), double_handle(2.0));
        let root = Node::set(&root, &Path::parse("b"), double_handle(3.0));
        let extracted = Node::extract(&root, &[Path::parse("a/x"), Path::parse("b")]);
        assert_eq!(
            Node::get(&extracted, &Path::parse("a/x")).unwrap().as_double(),
            Some(1.0)
        );
        assert_eq!(
            Node::get(&extracted, &Path::parse("b")).unwrap().as_double(),
            Some(3.0)
        );
        assert!(Node::get(&extracted, &Path::parse("a/y")).is_none());
    }

    #[test]
    fn transform_all_applies_actions_in_order() {
        let root = Node::set(&None, &Path::parse("key"), double_handle(1.0));
        let double_it: &dyn Fn(&NodeHandle) -> NodeHandle = &|h: &NodeHandle| {
            let current = h.as_ref().and_then(|n| n.as_double()).unwrap_or(0.0);
            double_handle(current * 2.0)
        };
        let actions: Vec<(Path, &dyn Fn(&NodeHandle) -> NodeHandle)> =
            vec![(Path::parse("key"), double_it), (Path::parse("key"), double_it)];
        let updated = Node::transform_all(&root, &actions);
        assert_eq!(
            Node::get(&updated, &Path::parse("key")).unwrap().as_double(),
            Some(4.0)
        );
    }

    #[test]
    fn fold_aggregates_precondition_style_reducers() {
        let root = Node::set(&None, &Path::parse("a"), double_handle(1.0));
        let root = Node::set(&root, &Path::parse("b"), double_handle(2.0));
        let actions = vec![
            (Path::parse("a"), 1.0_f64),
            (Path::parse("b"), 2.0_f64),
            (Path::parse("missing"), 0.0_f64),
        ];
        let all_match = Node::fold(
            &root,
            &actions,
            |expected, handle| matches!(handle, Some(n) if n.as_double() == Some(*expected)),
            |acc, value| acc && value,
            true,
        );
        assert!(!all_match); // "missing" is absent, so its reducer is false
    }

    #[test]
    fn get_on_missing_branch_returns_absent() {
        let root = empty_object_handle();
        let result = Node::get(&root, &Path::parse("foo/bar"));
        assert!(result.is_none());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let root = None;
        let updated = Node::set(&root, &Path::parse("a/b/c"), double_handle(1.0));
        let read = Node::get(&updated, &Path::parse("a/b/c"));
        assert_eq!(read.unwrap().as_double(), Some(1.0));
        // The original handle is untouched.
        assert!(root.is_none());
    }

    #[test]
    fn set_absent_deletes_key() {
        let root = Node::set(&None, &Path::parse("a"), double_handle(1.0));
        let deleted = Node::set(&root, &Path::parse("a"), None);
        assert!(Node::get(&deleted, &Path::parse("a")).is_none());
        // Old root still has `a`.
        assert!(Node::get(&root, &Path::parse("a")).is_some());
    }

    #[test]
    fn overlay_explicit_null_replaces_value() {
        let base = Node::set(&None, &Path::parse("a"), double_handle(1.0));
        let overlay = Node::set(&None, &Path::parse("a"), null_handle());
        let merged = Node::overlay(&base, &overlay);
        let value = Node::get(&merged, &Path::parse("a")).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn overlay_absent_key_leaves_base_untouched() {
        let base = Node::set(&None, &Path::parse("a"), double_handle(1.0));
        let overlay = empty_object_handle();
        let merged = Node::overlay(&base, &overlay);
        assert_eq!(
            Node::get(&merged, &Path::parse("a")).unwrap().as_double(),
            Some(1.0)
        );
    }

    #[test]
    fn set_numeric_segment_extends_array_with_null() {
        // A numeric segment only indexes into an Array when the node
        // currently being descended is already one — so the array has to
        // exist first.
        let root = Node::set(&None, &Path::parse("arr"), empty_array_handle());
        let root = Node::set(&root, &Path::parse("arr/2"), double_handle(9.0));
        let array = Node::get(&root, &Path::parse("arr")).unwrap();
        let items = array.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.get(0).unwrap().as_ref().unwrap().is_null());
        assert!(items.get(1).unwrap().as_ref().unwrap().is_null());
        assert_eq!(items.get(2).unwrap().as_ref().unwrap().as_double(), Some(9.0));
    }

    #[test]
    fn set_numeric_segment_against_absent_root_creates_an_object() {
        // A numeric-looking segment against an absent/non-array node never
        // fabricates an Array — intermediate containers are always Objects.
        let root = Node::set(&None, &Path::parse("arr/2"), double_handle(9.0));
        let arr = Node::get(&root, &Path::parse("arr")).unwrap();
        assert!(arr.as_object().is_some());
        assert_eq!(
            Node::get(&root, &Path::parse("arr/2")).unwrap().as_double(),
            Some(9.0)
        );
    }

    #[test]
    fn set_numeric_segment_against_existing_object_stays_an_object() {
        let root = Node::set(&None, &Path::parse("a"), empty_object_handle());
        let root = Node::set(&root, &Path::parse("a/2"), double_handle(1.0));
        let a = Node::get(&root, &Path::parse("a")).unwrap();
        assert!(a.as_object().is_some());
        assert_eq!(
            Node::get(&root, &Path::parse("a/2")).unwrap().as_double(),
            Some(1.0)
        );
    }

    #[test]
    fn scenario_s3_overlay_tombstone_removes_key() {
        let base = Node::set(&None, &Path::parse("key/bar"), double_handle(12.0));
        let base = Node::set(&base, &Path::parse("foo/0"), string_handle("blub"));
        let overlay = Node::tombstone_at(&Path::parse("key/bar"));
        let merged = Node::overlay(&base, &overlay);
        assert!(Node::get(&merged, &Path::parse("key/bar")).is_none());
        // "key" itself becomes an empty object, not removed outright.
        assert!(Node::get(&merged, &Path::parse("key")).unwrap().as_object().unwrap().is_empty());
        assert_eq!(
            Node::get(&merged, &Path::parse("foo/0")).unwrap().as_str(),
            Some("blub")
        );
    }

    #[test]
    fn scenario_s3_overlay_explicit_null_keeps_key() {
        let base = Node::set(&None, &Path::parse("key/bar"), double_handle(12.0));
        let overlay = Node::set(&None, &Path::parse("key/bar"), null_handle());
        let merged = Node::overlay(&base, &overlay);
        assert!(Node::get(&merged, &Path::parse("key/bar")).unwrap().is_null());
    }

    #[test]
    fn scenario_s6_non_numeric_segment_promotes_array_to_object() {
        // Base `{"foo":["blub"]}` — built directly as an Array, since a
        // path-based `set` from an absent root never fabricates one.
        let mut foo_items = Vector::new();
        foo_items.push_back(string_handle("blub"));
        let base = Node::set(
            &None,
            &Path::parse("foo"),
            Some(Arc::new(Node::Array(foo_items))),
        );
        let updated = Node::set(&base, &Path::parse("foo/x/bar"), bool_handle(false));
        let foo = Node::get(&updated, &Path::parse("foo")).unwrap();
        let map = foo.as_object().unwrap();
        assert_eq!(map.get("0").unwrap().as_ref().unwrap().as_str(), Some("blub"));
        assert_eq!(
            Node::get(&updated, &Path::parse("foo/x/bar")).unwrap().as_bool(),
            Some(false)
        );
    }

    #[test]
    fn overlay_array_extends_and_replaces_by_index() {
        let base = Node::set(&None, &Path::parse("key"), empty_array_handle());
        let base = Node::set(&base, &Path::parse("key/0"), double_handle(1.0));
        let mut overlay_items = Vector::new();
        overlay_items.push_back(None);
        overlay_items.push_back(double_handle(9.0));
        let overlay = Node::set(
            &None,
            &Path::parse("key"),
            Some(Arc::new(Node::Array(overlay_items))),
        );
        let merged = Node::overlay(&base, &overlay);
        let items = Node::get(&merged, &Path::parse("key")).unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items.get(0).unwrap().as_ref().unwrap().as_double(), Some(1.0));
        assert_eq!(items.get(1).unwrap().as_ref().unwrap().as_double(), Some(9.0));
    }

    #[test]
    fn overlay_array_replaces_elements_wholesale_without_recursing() {
        // Overlaying `{"a":[{"x":1}]}` with `{"a":[{"y":2}]}` replaces the
        // element outright — it does not merge to `{"x":1,"y":2}`.
        let base_element = Node::set(&None, &Path::parse("x"), double_handle(1.0));
        let mut base_items = Vector::new();
        base_items.push_back(base_element);
        let base = Node::set(
            &None,
            &Path::parse("a"),
            Some(Arc::new(Node::Array(base_items))),
        );

        let overlay_element = Node::set(&None, &Path::parse("y"), double_handle(2.0));
        let mut overlay_items = Vector::new();
        overlay_items.push_back(overlay_element);
        let overlay = Node::set(
            &None,
            &Path::parse("a"),
            Some(Arc::new(Node::Array(overlay_items))),
        );

        let merged = Node::overlay(&base, &overlay);
        let element = Node::get(&merged, &Path::parse("a/0")).unwrap();
        let element = element.as_object().unwrap();
        assert!(!element.contains_key("x"));
        assert_eq!(element.get("y").unwrap().as_ref().unwrap().as_double(), Some(2.0));
    }

    #[test]
    fn invariant_transform_equivalence() {
        let root = Node::set(&None, &Path::parse("a"), double_handle(1.0));
        let f: &dyn Fn(&NodeHandle) -> NodeHandle = &|h| {
            double_handle(h.as_ref().and_then(|n| n.as_double()).unwrap_or(0.0) + 1.0)
        };
        let via_transform = Node::transform(&root, &Path::parse("a"), f);
        let via_set = Node::set(&root, &Path::parse("a"), f(&Node::get(&root, &Path::parse("a"))));
        assert_eq!(via_transform, via_set);
    }

    #[test]
    fn wire_round_trip_preserves_tree() {
        let root = Node::set(&None, &Path::parse("a/b"), string_handle("hi"));
        let root = Node::set(&root, &Path::parse("a/c"), double_handle(2.0));
        let builder = Node::into_builder(&root);
        let bytes = builder.finish();
        let slice = Slice::new(&bytes).unwrap();
        let decoded = Node::from_slice(slice).unwrap();
        assert_eq!(decoded, root);
    }
}
