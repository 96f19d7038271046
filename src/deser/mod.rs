//! A compositional, type-directed parser over [`crate::wire::Slice`].
//!
//! Translated from `examples/original_source/deserialize/*.h`'s
//! template-metaprogramming DSL (`value_reader`, `attribute`,
//! `parameter_list`, `array`, `map`, `fixed_order`,
//! `field_value_dependent`, `field_name_dependent`, `conditional`,
//! `try_alternatives`, `unpack_proxy`, `hints`) into runtime trait objects
//! and closures, per spec.md §9(b): "replace with ... runtime combinator
//! objects implementing a common parser trait."
//!
//! Every combinator implements [`Deserialize`]; composing two combinators is
//! just calling one function with another's result. Errors are
//! [`DeserializeError`], which accumulate a trace as they unwind back up
//! through nested combinators via [`DeserializeError::wrap`].

mod errors;

pub use errors::{DeserializeError, TraceStep};

use crate::wire::Slice;
use std::collections::BTreeMap;

pub type Result<T> = std::result::Result<T, DeserializeError>;

/// A parser from a wire [`Slice`] to a typed `Output`.
pub trait Deserialize {
    type Output;
    fn deserialize(&self, slice: Slice<'_>) -> Result<Self::Output>;
}

impl<F, T> Deserialize for F
where
    F: Fn(Slice<'_>) -> Result<T>,
{
    type Output = T;
    fn deserialize(&self, slice: Slice<'_>) -> Result<T> {
        self(slice)
    }
}

/// `from_factory`: wraps a deserializer's output with a plain function,
/// corresponding to the original's "attach a factory callable that
/// receives the plan's tuple and constructs the final value."
pub struct MapOutput<D, F> {
    inner: D,
    factory: F,
}

impl<D, F, U> Deserialize for MapOutput<D, F>
where
    D: Deserialize,
    F: Fn(D::Output) -> U,
{
    type Output = U;
    fn deserialize(&self, slice: Slice<'_>) -> Result<U> {
        self.inner.deserialize(slice).map(&self.factory)
    }
}

/// Extension trait giving every [`Deserialize`] a `.map_output(factory)`
/// combinator, mirroring `utilities::constructing_deserializer`'s role of
/// applying a factory to a plan's result.
pub trait DeserializeExt: Deserialize + Sized {
    fn map_output<U>(self, factory: impl Fn(Self::Output) -> U) -> MapOutput<Self, impl Fn(Self::Output) -> U> {
        MapOutput {
            inner: self,
            factory,
        }
    }
}

impl<D: Deserialize> DeserializeExt for D {}

/// Reads a leaf double. Corresponds to `value_reader<double>`.
pub fn double_reader(slice: Slice<'_>) -> Result<f64> {
    slice
        .as_double()
        .map_err(|_| DeserializeError::new("value is not a double"))
}

/// Reads a leaf bool. Corresponds to `value_reader<bool>`.
pub fn bool_reader(slice: Slice<'_>) -> Result<bool> {
    slice
        .as_bool()
        .map_err(|_| DeserializeError::new("value is not a bool"))
}

/// Reads a leaf string, owned. Corresponds to `value_reader<std::string>`.
pub fn string_reader(slice: Slice<'_>) -> Result<String> {
    slice
        .as_str()
        .map(str::to_owned)
        .map_err(|_| DeserializeError::new("value is not a string"))
}

/// Reads any value into a [`crate::node::Node`] tree, for fields whose
/// shape isn't constrained by the schema (e.g. `"new"` in a `set`
/// operation).
pub fn node_reader(slice: Slice<'_>) -> Result<crate::node::NodeHandle> {
    crate::node::Node::from_slice(slice).map_err(|_| DeserializeError::new("value is not valid"))
}

/// `attribute(name, inner)`: reads object field `name` and applies `inner`
/// to its value, wrapping any failure with the field's name.
pub fn attribute<D: Deserialize>(name: &'static str, inner: D) -> impl Deserialize<Output = D::Output> {
    move |slice: Slice<'_>| {
        let field = slice
            .get(name)
            .map_err(|_| DeserializeError::new("expected an object"))?;
        if field.is_none() {
            return Err(DeserializeError::new("missing required field").wrap_field(name));
        }
        inner
            .deserialize(field)
            .map_err(|e| e.wrap_field(name))
    }
}

/// `factory_simple_parameter(name, reader, default)`: reads `name` as a
/// value via `reader`; substitutes `default()` when the field is missing.
pub fn optional_field<D: Deserialize>(
    name: &'static str,
    inner: D,
    default: impl Fn() -> D::Output,
) -> impl Deserialize<Output = D::Output> {
    move |slice: Slice<'_>| {
        let field = slice
            .get(name)
            .map_err(|_| DeserializeError::new("expected an object"))?;
        if field.is_none() {
            return Ok(default());
        }
        inner.deserialize(field).map_err(|e| e.wrap_field(name))
    }
}

/// `expected_value(name, literal)`: asserts object field `name` equals
/// `literal`; consumes the field but contributes no typed value.
pub fn expected_string(name: &'static str, literal: &'static str) -> impl Deserialize<Output = ()> {
    move |slice: Slice<'_>| {
        let field = slice
            .get(name)
            .map_err(|_| DeserializeError::new("expected an object"))?;
        let value = field
            .as_str()
            .map_err(|_| DeserializeError::new("value is not a string").wrap_field(name))?;
        if value != literal {
            return Err(
                DeserializeError::new(format!("expected literal \"{literal}\"")).wrap_field(name),
            );
        }
        Ok(())
    }
}

/// `parameter_list(names, inner)`: asserts `slice` is an object whose
/// members are all named in `names` — failing, strictly, on any field not
/// covered by a parameter — then hands the whole slice to `inner` to
/// actually read the covered fields out via `attribute`/`optional_field`.
/// Factoring the strict-rejection check out this way keeps each schema's
/// field reads unchanged while still enforcing spec's "fails if there are
/// object fields not covered by any parameter" contract.
pub fn parameter_list<D: Deserialize>(
    names: &'static [&'static str],
    inner: D,
) -> impl Deserialize<Output = D::Output> {
    move |slice: Slice<'_>| {
        if !slice.is_object() {
            return Err(DeserializeError::new("expected an object"));
        }
        for pair in slice
            .iter_object()
            .map_err(|_| DeserializeError::new("expected an object"))?
        {
            let (key, _) = pair.map_err(|_| DeserializeError::new("malformed object member"))?;
            if !names.contains(&key) {
                return Err(DeserializeError::new(format!("unexpected field \"{key}\"")));
            }
        }
        inner.deserialize(slice)
    }
}

/// `array(inner)`: input must be an array; applies `inner` per element,
/// collecting into a `Vec`, with index-tagged errors.
pub fn array<D: Deserialize>(inner: D) -> impl Deserialize<Output = Vec<D::Output>> {
    move |slice: Slice<'_>| {
        if !slice.is_array() {
            return Err(DeserializeError::new("value is not an array"));
        }
        let mut out = Vec::new();
        for (index, element) in slice
            .iter_array()
            .map_err(|_| DeserializeError::new("value is not an array"))?
            .enumerate()
        {
            let element = element.map_err(|_| DeserializeError::new("malformed array element"))?;
            out.push(inner.deserialize(element).map_err(|e| e.wrap_index(index))?);
        }
        Ok(out)
    }
}

/// `map(inner)`: input must be an object; applies `inner` per member value,
/// collecting into a `BTreeMap<String, _>` while iterating in the object's
/// own (insertion) order — field order is preserved by collecting a `Vec`
/// of pairs first and converting only at the boundary.
pub fn map<D: Deserialize>(inner: D) -> impl Deserialize<Output = Vec<(String, D::Output)>> {
    move |slice: Slice<'_>| {
        if !slice.is_object() {
            return Err(DeserializeError::new("value is not an object"));
        }
        let mut out = Vec::new();
        for pair in slice
            .iter_object()
            .map_err(|_| DeserializeError::new("value is not an object"))?
        {
            let (key, value) = pair.map_err(|_| DeserializeError::new("malformed object member"))?;
            let parsed = inner.deserialize(value).map_err(|e| e.wrap_field(key))?;
            out.push((key.to_owned(), parsed));
        }
        Ok(out)
    }
}

/// Convenience: same as [`map`] but collected into a `BTreeMap`, for
/// callers that don't need insertion order (most do, via [`map`]).
pub fn map_sorted<D: Deserialize>(inner: D) -> impl Deserialize<Output = BTreeMap<String, D::Output>> {
    let inner_map = map(inner);
    move |slice: Slice<'_>| Ok(inner_map.deserialize(slice)?.into_iter().collect())
}

/// `field_value_dependent(name, dispatch)`: reads `name`'s string value,
/// then hands the whole slice to whichever parser `dispatch` selects for
/// that literal.
pub fn field_value_dependent<T>(
    name: &'static str,
    dispatch: impl Fn(&str) -> Option<Box<dyn Deserialize<Output = T>>>,
) -> impl Deserialize<Output = T> {
    move |slice: Slice<'_>| {
        let field = slice
            .get(name)
            .map_err(|_| DeserializeError::new("expected an object"))?;
        let tag = field
            .as_str()
            .map_err(|_| DeserializeError::new("value is not a string").wrap_field(name))?;
        match dispatch(tag) {
            Some(parser) => parser.deserialize(slice),
            None => Err(DeserializeError::new(format!("unknown \"{name}\": \"{tag}\""))),
        }
    }
}

/// `field_name_dependent(branches)`: picks the first branch whose named
/// field is present in the object, and applies its parser to the whole
/// slice.
pub fn field_name_dependent<T>(
    branches: Vec<(&'static str, Box<dyn Deserialize<Output = T>>)>,
) -> impl Deserialize<Output = T> {
    move |slice: Slice<'_>| {
        if !slice.is_object() {
            return Err(DeserializeError::new("value is not an object"));
        }
        for (field_name, parser) in &branches {
            if slice.has_key(field_name).unwrap_or(false) {
                return parser.deserialize(slice);
            }
        }
        let names: Vec<&str> = branches.iter().map(|(n, _)| *n).collect();
        Err(DeserializeError::new(format!(
            "expected one of {names:?} to be present"
        )))
    }
}

/// `fixed_order(readers)`: input must be an array of exactly `readers.len()`
/// elements; applies each in order, producing a `Vec` of results.
pub fn fixed_order<T>(readers: Vec<Box<dyn Deserialize<Output = T>>>) -> impl Deserialize<Output = Vec<T>> {
    move |slice: Slice<'_>| {
        if !slice.is_array() {
            return Err(DeserializeError::new("value is not an array"));
        }
        let len = slice
            .length()
            .map_err(|_| DeserializeError::new("value is not an array"))?;
        if len != readers.len() {
            return Err(DeserializeError::new(format!(
                "expected an array of exactly {} elements, found {len}",
                readers.len()
            )));
        }
        let mut out = Vec::with_capacity(readers.len());
        for (index, reader) in readers.iter().enumerate() {
            let element = slice
                .at(index)
                .map_err(|_| DeserializeError::new("malformed array element"))?;
            out.push(reader.deserialize(element).map_err(|e| e.wrap_index(index))?);
        }
        Ok(out)
    }
}

/// `try_alternatives(readers)`: tries each parser in order; the first
/// success wins. If all fail, the last error is surfaced (matching the
/// original's "combined error" intent closely enough for a message-bearing
/// trace; this crate doesn't aggregate a list of N failures into one type).
pub fn try_alternatives<T>(readers: Vec<Box<dyn Deserialize<Output = T>>>) -> impl Deserialize<Output = T> {
    move |slice: Slice<'_>| {
        let mut last_err = None;
        for reader in &readers {
            match reader.deserialize(slice) {
                Ok(value) => return Ok(value),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DeserializeError::new("no alternative matched")))
    }
}

/// `conditional(branches, default)`: picks the first branch whose predicate
/// over the slice is true.
pub fn conditional<T>(
    branches: Vec<(Box<dyn Fn(Slice<'_>) -> bool>, Box<dyn Deserialize<Output = T>>)>,
    default: Box<dyn Deserialize<Output = T>>,
) -> impl Deserialize<Output = T> {
    move |slice: Slice<'_>| {
        for (predicate, parser) in &branches {
            if predicate(slice) {
                return parser.deserialize(slice);
            }
        }
        default.deserialize(slice)
    }
}

/// `unpack_proxy`: boxes a deserializer so recursive schemas (a schema that
/// refers to itself) can close the cycle through a trait object instead of
/// an infinitely-sized type.
pub struct UnpackProxy<T> {
    inner: Box<dyn Deserialize<Output = T>>,
}

impl<T> UnpackProxy<T> {
    pub fn new(inner: impl Deserialize<Output = T> + 'static) -> Self {
        UnpackProxy {
            inner: Box::new(inner),
        }
    }
}

impl<T> Deserialize for UnpackProxy<T> {
    type Output = T;
    fn deserialize(&self, slice: Slice<'_>) -> Result<T> {
        self.inner.deserialize(slice)
    }
}

/// Static hints threaded alongside a slice so an inner deserializer can
/// skip a re-lookup the outer one already performed (e.g. `field_value_dependent`
/// has already confirmed `"op"` exists and what it says). Purely an
/// optimization hook; every combinator above works correctly without ever
/// consulting a `Hints` value.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    known_tag: Option<&'static str>,
}

impl Hints {
    pub fn with_known_tag(tag: &'static str) -> Self {
        Hints {
            known_tag: Some(tag),
        }
    }

    pub fn known_tag(&self) -> Option<&'static str> {
        self.known_tag
    }
}

/// Top-level executor: parses `slice` with `deserializer`, per spec.md
/// §4.5's `deserialize<D>(slice, hints) -> result<T, error>` contract. The
/// `hints` parameter is accepted for interface parity but unused by any
/// combinator above (see [`Hints`]'s doc comment).
pub fn deserialize<D: Deserialize>(
    deserializer: &D,
    slice: Slice<'_>,
    _hints: &Hints,
) -> Result<D::Output> {
    deserializer.deserialize(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Builder;

    #[test]
    fn attribute_reads_nested_field() {
        let mut b = Builder::new();
        b.open_object();
        b.key("delta");
        b.append_double(5.0);
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = attribute("delta", double_reader);
        assert_eq!(parser.deserialize(slice).unwrap(), 5.0);
    }

    #[test]
    fn scenario_s7_trace_ends_in_delta_not_a_double() {
        let mut b = Builder::new();
        b.open_object();
        b.key("op");
        b.append_string("increment");
        b.key("delta");
        b.append_string("notanumber");
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = attribute("delta", double_reader);
        let err = parser.deserialize(slice).unwrap_err();
        assert_eq!(err.render(), ".delta: value is not a double");
    }

    #[test]
    fn array_combinator_tags_index_on_failure() {
        let mut b = Builder::new();
        b.open_array();
        b.append_double(1.0);
        b.append_string("nope");
        b.close_array();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = array(double_reader);
        let err = parser.deserialize(slice).unwrap_err();
        assert_eq!(err.render(), "[1]: value is not a double");
    }

    #[test]
    fn parameter_list_rejects_unknown_fields() {
        let mut b = Builder::new();
        b.open_object();
        b.key("delta");
        b.append_double(1.0);
        b.key("bogus");
        b.append_bool(true);
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = parameter_list(&["delta"], attribute("delta", double_reader));
        let err = parser.deserialize(slice).unwrap_err();
        assert_eq!(err.render(), "unexpected field \"bogus\"");
    }

    #[test]
    fn parameter_list_accepts_covered_fields() {
        let mut b = Builder::new();
        b.open_object();
        b.key("delta");
        b.append_double(1.0);
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = parameter_list(&["delta"], attribute("delta", double_reader));
        assert_eq!(parser.deserialize(slice).unwrap(), 1.0);
    }

    #[test]
    fn missing_required_field_reports_field_name() {
        let mut b = Builder::new();
        b.open_object();
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let parser = attribute("delta", double_reader);
        let err = parser.deserialize(slice).unwrap_err();
        assert_eq!(err.render(), ".delta: missing required field");
    }
}
