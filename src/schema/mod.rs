//! Transaction envelope schemas built on the [`crate::deser`] DSL.
//!
//! Grounded directly on spec.md §4.6; the `op`/`old`|`oldNot`|`oldEmpty`
//! dispatch tables are name-for-name translations of the tables there, and
//! the extensible operation set (`remove`, `decrement`, `push`, `prepend`,
//! `pop`, `shift`, `erase`) fills in what spec.md lists as "(extensible:
//! ..., …)" against [`crate::transform`]'s built-ins.

use crate::condition::{self, Condition};
use crate::deser::{
    self, array, attribute, field_name_dependent, field_value_dependent, map, optional_field,
    parameter_list, string_reader, Deserialize, DeserializeError, DeserializeExt,
};
use crate::node::Node;
use crate::path::Path;
use crate::transaction::{Envelope, Operation, Precondition, Transaction};
use crate::transform::{self, Transform};
use crate::wire::Slice;
use std::time::Duration;

/// `set`: `{op: "set", new: any, ttl?: double}`. Rejects any field outside
/// that trio via [`parameter_list`].
fn set_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "new", "ttl"], |slice: Slice<'_>| {
        let value = attribute("new", deser::node_reader).deserialize(slice)?;
        let ttl_field = slice
            .get("ttl")
            .map_err(|_| DeserializeError::new("expected an object"))?;
        let ttl = if ttl_field.is_none() {
            None
        } else {
            Some(deser::double_reader(ttl_field).map_err(|e| e.wrap_field("ttl"))?)
        };
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::set(value));
        Ok((transform, ttl.map(Duration::from_secs_f64)))
    })
}

/// `increment`: `{op: "increment", delta?: double}`, default delta `1.0`.
fn increment_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "delta"], |slice: Slice<'_>| {
        let delta = optional_field("delta", deser::double_reader, || 1.0).deserialize(slice)?;
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::increment(delta));
        Ok((transform, None))
    })
}

/// `decrement`: `{op: "decrement", delta?: double}`, default delta `1.0`.
fn decrement_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "delta"], |slice: Slice<'_>| {
        let delta = optional_field("delta", deser::double_reader, || 1.0).deserialize(slice)?;
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::increment(-delta));
        Ok((transform, None))
    })
}

/// `remove`: `{op: "remove"}`.
fn remove_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op"], |_slice: Slice<'_>| {
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::remove());
        Ok((transform, None))
    })
}

/// `push`: `{op: "push", new: any}`.
fn push_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "new"], |slice: Slice<'_>| {
        let value = attribute("new", deser::node_reader).deserialize(slice)?;
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::push(value));
        Ok((transform, None))
    })
}

/// `prepend`: `{op: "prepend", new: any}`.
fn prepend_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "new"], |slice: Slice<'_>| {
        let value = attribute("new", deser::node_reader).deserialize(slice)?;
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::prepend(value));
        Ok((transform, None))
    })
}

/// `pop`: `{op: "pop"}`.
fn pop_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op"], |_slice: Slice<'_>| {
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::pop());
        Ok((transform, None))
    })
}

/// `shift`: `{op: "shift"}`.
fn shift_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op"], |_slice: Slice<'_>| {
        let transform: Box<dyn Transform + Send + Sync> = Box::new(transform::shift());
        Ok((transform, None))
    })
}

/// `erase`: `{op: "erase", value: any}` — removes the first array element
/// deep-equal to `value`.
fn erase_operation() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)> {
    parameter_list(&["op", "value"], |slice: Slice<'_>| {
        let value = attribute("value", deser::node_reader).deserialize(slice)?;
        let transform: Box<dyn Transform + Send + Sync> =
            Box::new(transform::erase(handle_to_node(value)));
        Ok((transform, None))
    })
}

/// Parses one operation object, dispatching on its `"op"` field.
pub fn operation_deserializer() -> impl Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)>
{
    field_value_dependent("op", |tag| -> Option<Box<dyn Deserialize<Output = (Box<dyn Transform + Send + Sync>, Option<Duration>)>>> {
        match tag {
            "set" => Some(Box::new(set_operation())),
            "increment" => Some(Box::new(increment_operation())),
            "decrement" => Some(Box::new(decrement_operation())),
            "remove" => Some(Box::new(remove_operation())),
            "push" => Some(Box::new(push_operation())),
            "prepend" => Some(Box::new(prepend_operation())),
            "pop" => Some(Box::new(pop_operation())),
            "shift" => Some(Box::new(shift_operation())),
            "erase" => Some(Box::new(erase_operation())),
            _ => None,
        }
    })
}

/// Parses one precondition object, dispatching on which of `"old"`,
/// `"oldNot"`, `"oldEmpty"` is present. Each branch is wrapped in
/// [`parameter_list`] so a precondition object can carry only the one field
/// its branch names.
pub fn precondition_deserializer() -> impl Deserialize<Output = Box<dyn Condition + Send + Sync>> {
    field_name_dependent(vec![
        (
            "old",
            Box::new(parameter_list(
                &["old"],
                attribute("old", deser::node_reader).map_output(|value| {
                    let node: Box<dyn Condition + Send + Sync> =
                        Box::new(condition::equal(handle_to_node(value)));
                    node
                }),
            )) as Box<dyn Deserialize<Output = Box<dyn Condition + Send + Sync>>>,
        ),
        (
            "oldNot",
            Box::new(parameter_list(
                &["oldNot"],
                attribute("oldNot", deser::node_reader).map_output(|value| {
                    let node: Box<dyn Condition + Send + Sync> =
                        Box::new(condition::not_equal(handle_to_node(value)));
                    node
                }),
            )),
        ),
        (
            "oldEmpty",
            // `"oldEmpty": bool` -> `is_empty(inverted = !bool)`: `true`
            // requires absence, `false` requires presence.
            Box::new(parameter_list(
                &["oldEmpty"],
                attribute("oldEmpty", deser::bool_reader).map_output(|old_empty| {
                    let cond: Box<dyn Condition + Send + Sync> = if old_empty {
                        Box::new(condition::is_empty())
                    } else {
                        Box::new(condition::invert(condition::is_empty()))
                    };
                    cond
                }),
            )),
        ),
    ])
}

fn handle_to_node(handle: crate::node::NodeHandle) -> Node {
    handle.map(|arc| (*arc).clone()).unwrap_or(Node::Null)
}

/// Parses `path-string -> operation` entries in textual order, per
/// spec.md §4.6's "preserving textual order".
pub fn operations_map_deserializer() -> impl Deserialize<Output = Vec<(Path, (Box<dyn Transform + Send + Sync>, Option<Duration>))>> {
    map(operation_deserializer()).map_output(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| (Path::parse(&key), value))
            .collect()
    })
}

pub fn preconditions_map_deserializer() -> impl Deserialize<Output = Vec<(Path, Box<dyn Condition + Send + Sync>)>> {
    map(precondition_deserializer()).map_output(|pairs| {
        pairs
            .into_iter()
            .map(|(key, value)| (Path::parse(&key), value))
            .collect()
    })
}

/// `fixed_order`: `[operations_map, preconditions_map, client_id]`.
pub fn transaction_deserializer() -> impl Deserialize<Output = Transaction> {
    |slice: Slice<'_>| {
        if !slice.is_array() {
            return Err(DeserializeError::new("value is not an array"));
        }
        let len = slice
            .length()
            .map_err(|_| DeserializeError::new("value is not an array"))?;
        if len != 3 {
            return Err(DeserializeError::new(format!(
                "expected an array of exactly 3 elements, found {len}"
            )));
        }
        let op_slice = slice
            .at(0)
            .map_err(|_| DeserializeError::new("malformed array element"))?;
        let pre_slice = slice
            .at(1)
            .map_err(|_| DeserializeError::new("malformed array element"))?;
        let client_slice = slice
            .at(2)
            .map_err(|_| DeserializeError::new("malformed array element"))?;

        let raw_operations = operations_map_deserializer()
            .deserialize(op_slice)
            .map_err(|e| e.wrap_index(0))?;
        let raw_preconditions = preconditions_map_deserializer()
            .deserialize(pre_slice)
            .map_err(|e| e.wrap_index(1))?;
        let client_id = string_reader(client_slice).map_err(|e| e.wrap_index(2))?;

        let operations = raw_operations
            .into_iter()
            .map(|(path, (transform, ttl))| Operation {
                path,
                transform,
                ttl,
            })
            .collect();
        let preconditions = raw_preconditions
            .into_iter()
            .map(|(path, condition)| Precondition { path, condition })
            .collect();

        Ok(Transaction {
            operations,
            preconditions,
            client_id,
        })
    }
}

/// `array(transaction_deserializer)`: an envelope is an array of
/// transactions.
pub fn envelope_deserializer() -> impl Deserialize<Output = Envelope> {
    array(transaction_deserializer()).map_output(|transactions| Envelope { transactions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Builder;

    fn build_increment_transaction() -> Vec<u8> {
        let mut b = Builder::new();
        b.open_array(); // envelope
        b.open_array(); // transaction
        b.open_object(); // operations
        b.key("arango/Plan/Version");
        b.open_object();
        b.key("op");
        b.append_string("increment");
        b.close_object();
        b.close_object();
        b.open_object(); // preconditions
        b.close_object();
        b.append_string("client-1"); // client id
        b.close_array();
        b.close_array();
        b.finish()
    }

    #[test]
    fn parses_increment_transaction_envelope() {
        let bytes = build_increment_transaction();
        let slice = Slice::new(&bytes).unwrap();
        let envelope = envelope_deserializer().deserialize(slice).unwrap();
        assert_eq!(envelope.transactions.len(), 1);
        let txn = &envelope.transactions[0];
        assert_eq!(txn.client_id, "client-1");
        assert_eq!(txn.operations.len(), 1);
        assert_eq!(txn.operations[0].path.to_string(), "/arango/Plan/Version");
    }

    #[test]
    fn operation_rejects_unknown_field() {
        let mut b = Builder::new();
        b.open_object();
        b.key("op");
        b.append_string("increment");
        b.key("bogus");
        b.append_double(1.0);
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let err = operation_deserializer().deserialize(slice).unwrap_err();
        assert_eq!(err.render(), "unexpected field \"bogus\"");
    }

    #[test]
    fn precondition_rejects_unknown_field() {
        let mut b = Builder::new();
        b.open_object();
        b.key("old");
        b.append_double(1.0);
        b.key("oldNot");
        b.append_double(2.0);
        b.close_object();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let err = precondition_deserializer().deserialize(slice).unwrap_err();
        assert_eq!(err.render(), "unexpected field \"oldNot\"");
    }

    #[test]
    fn scenario_s7_increment_with_bad_delta_reports_trace() {
        let mut b = Builder::new();
        b.open_array();
        b.open_object();
        b.key("op");
        b.append_string("increment");
        b.key("delta");
        b.append_string("notanumber");
        b.close_object();
        b.close_array();
        let bytes = b.finish();
        let slice = Slice::new(&bytes).unwrap();
        let err = array(operation_deserializer())
            .deserialize(slice)
            .unwrap_err();
        assert!(err.render().ends_with(".delta: value is not a double"));
    }
}
