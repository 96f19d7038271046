//! A self-describing, zero-copy binary encoding isomorphic to JSON.
//!
//! This is the wire format spec.md §6 describes as "a self-describing
//! binary JSON ('velocypack-like') tagged binary encoding": [`Slice`] is an
//! immutable, zero-copy *view* over an already-encoded buffer (no value is
//! materialized until asked for), and [`Builder`] is the write side.
//!
//! No registry crate implements ArangoDB's VelocyPack for Rust, so this is
//! first-party code (see `DESIGN.md`), written in the teacher's
//! one-concern-per-file style (`errors.rs`, `builder.rs` alongside this
//! module).
//!
//! # Layout
//!
//! Every encoded value starts with a one-byte tag:
//!
//! | Tag | Meaning | Payload |
//! |---|---|---|
//! | `0x00` | Null | none |
//! | `0x01` | False | none |
//! | `0x02` | True | none |
//! | `0x03` | Double | 8 bytes, little-endian `f64` |
//! | `0x04` | String | `u32` LE byte length, then UTF-8 bytes |
//! | `0x05` | Array | `u32` LE total byte length, `u32` LE element count, elements back-to-back |
//! | `0x06` | Object | `u32` LE total byte length, `u32` LE member count, `(String key, value)` pairs in insertion order |
//! | `0x07` | None | none — the "no slice" sentinel, distinct from `Null` |
//!
//! Storing the total byte length in the Array/Object header (rather than
//! requiring a full recursive walk) makes `Slice::byte_len` O(1), the same
//! trick real VelocyPack uses for long containers.

mod builder;
mod errors;

pub use builder::Builder;
pub use errors::WireError;

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_DOUBLE: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_OBJECT: u8 = 0x06;
const TAG_NONE: u8 = 0x07;

/// The "no value" sentinel, pre-encoded, so `Slice::get` can return it
/// without allocating.
const NONE_BYTES: [u8; 1] = [TAG_NONE];
const NULL_BYTES: [u8; 1] = [TAG_NULL];

type Result<T> = std::result::Result<T, WireError>;

/// A zero-copy view over a single encoded value inside a byte buffer.
///
/// `Slice` borrows from the buffer it was constructed over; it never copies
/// payload bytes except when materializing an owned `String`/`f64`/etc. via
/// an explicit accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice<'a> {
    bytes: &'a [u8],
}

impl<'a> Slice<'a> {
    /// Wraps a buffer that starts with exactly one encoded value
    /// (`bytes` may be longer than the value; trailing bytes are ignored).
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(WireError::Truncated {
                expected: 1,
                found: 0,
            });
        }
        let slice = Slice { bytes };
        slice.byte_len()?;
        Ok(slice)
    }

    /// The "no value" sentinel: distinct from [`Slice::none`]'s sibling
    /// [`TAG_NULL`] — this is what `Slice::get` returns for a missing key.
    pub fn none() -> Self {
        Slice { bytes: &NONE_BYTES }
    }

    /// The canonical encoded `null` value.
    pub fn null() -> Self {
        Slice { bytes: &NULL_BYTES }
    }

    fn tag(&self) -> u8 {
        self.bytes[0]
    }

    fn require(&self, len: usize) -> Result<()> {
        if self.bytes.len() < len {
            return Err(WireError::Truncated {
                expected: len,
                found: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn read_u32(&self, at: usize) -> Result<u32> {
        self.require(at + 4)?;
        Ok(u32::from_le_bytes(self.bytes[at..at + 4].try_into().unwrap()))
    }

    /// Total encoded size, in bytes, of this value (tag + header + payload).
    pub fn byte_len(&self) -> Result<usize> {
        self.require(1)?;
        match self.tag() {
            TAG_NULL | TAG_FALSE | TAG_TRUE | TAG_NONE => Ok(1),
            TAG_DOUBLE => {
                self.require(9)?;
                Ok(9)
            }
            TAG_STRING => {
                let len = self.read_u32(1)? as usize;
                let total = 5 + len;
                self.require(total)?;
                Ok(total)
            }
            TAG_ARRAY | TAG_OBJECT => {
                let total = self.read_u32(1)? as usize;
                self.require(total)?;
                Ok(total)
            }
            other => Err(WireError::UnknownTag(other)),
        }
    }

    /// A slice truncated to exactly this value's bytes (useful once you've
    /// located a value inside a larger buffer via iteration).
    fn narrowed(&self) -> Result<Slice<'a>> {
        let len = self.byte_len()?;
        Ok(Slice {
            bytes: &self.bytes[..len],
        })
    }

    pub fn is_null(&self) -> bool {
        self.tag() == TAG_NULL
    }
    pub fn is_none(&self) -> bool {
        self.tag() == TAG_NONE
    }
    pub fn is_bool(&self) -> bool {
        matches!(self.tag(), TAG_FALSE | TAG_TRUE)
    }
    pub fn is_double(&self) -> bool {
        self.tag() == TAG_DOUBLE
    }
    pub fn is_number(&self) -> bool {
        self.is_double()
    }
    pub fn is_string(&self) -> bool {
        self.tag() == TAG_STRING
    }
    pub fn is_array(&self) -> bool {
        self.tag() == TAG_ARRAY
    }
    pub fn is_object(&self) -> bool {
        self.tag() == TAG_OBJECT
    }

    fn kind_name(&self) -> &'static str {
        match self.tag() {
            TAG_NULL => "null",
            TAG_FALSE | TAG_TRUE => "bool",
            TAG_DOUBLE => "double",
            TAG_STRING => "string",
            TAG_ARRAY => "array",
            TAG_OBJECT => "object",
            TAG_NONE => "none",
            _ => "invalid",
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.tag() {
            TAG_FALSE => Ok(false),
            TAG_TRUE => Ok(true),
            _ => Err(WireError::WrongKind {
                expected: "bool",
                found: self.kind_name(),
            }),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        if self.tag() != TAG_DOUBLE {
            return Err(WireError::WrongKind {
                expected: "double",
                found: self.kind_name(),
            });
        }
        self.require(9)?;
        Ok(f64::from_le_bytes(self.bytes[1..9].try_into().unwrap()))
    }

    pub fn as_str(&self) -> Result<&'a str> {
        if self.tag() != TAG_STRING {
            return Err(WireError::WrongKind {
                expected: "string",
                found: self.kind_name(),
            });
        }
        let len = self.read_u32(1)? as usize;
        self.require(5 + len)?;
        std::str::from_utf8(&self.bytes[5..5 + len]).map_err(|_| WireError::InvalidUtf8)
    }

    /// Number of elements (array) or members (object).
    pub fn length(&self) -> Result<usize> {
        match self.tag() {
            TAG_ARRAY | TAG_OBJECT => Ok(self.read_u32(9)? as usize),
            _ => Err(WireError::WrongKind {
                expected: "array or object",
                found: self.kind_name(),
            }),
        }
    }

    /// Indexes into an array. Returns [`Slice::none`] if `index` is out of
    /// range.
    pub fn at(&self, index: usize) -> Result<Slice<'a>> {
        if !self.is_array() {
            return Err(WireError::WrongKind {
                expected: "array",
                found: self.kind_name(),
            });
        }
        for (i, element) in self.iter_array()?.enumerate() {
            if i == index {
                return element;
            }
        }
        Ok(Slice::none())
    }

    /// Looks up an object member by key via a linear scan (matching
    /// VelocyPack's unindexed short-object lookup). Returns
    /// [`Slice::none`] if the key is absent.
    pub fn get(&self, key: &str) -> Result<Slice<'a>> {
        if !self.is_object() {
            return Err(WireError::WrongKind {
                expected: "object",
                found: self.kind_name(),
            });
        }
        for pair in self.iter_object()? {
            let (k, v) = pair?;
            if k == key {
                return Ok(v);
            }
        }
        Ok(Slice::none())
    }

    pub fn has_key(&self, key: &str) -> Result<bool> {
        Ok(!self.get(key)?.is_none())
    }

    /// Iterates this array's elements in order.
    pub fn iter_array(&self) -> Result<ArrayIter<'a>> {
        if !self.is_array() {
            return Err(WireError::WrongKind {
                expected: "array",
                found: self.kind_name(),
            });
        }
        let count = self.length()?;
        Ok(ArrayIter {
            bytes: &self.bytes[9..],
            remaining: count,
        })
    }

    /// Iterates this object's `(key, value)` members in insertion order.
    pub fn iter_object(&self) -> Result<ObjectIter<'a>> {
        if !self.is_object() {
            return Err(WireError::WrongKind {
                expected: "object",
                found: self.kind_name(),
            });
        }
        let count = self.length()?;
        Ok(ObjectIter {
            bytes: &self.bytes[9..],
            remaining: count,
        })
    }
}

/// Iterator over an array's elements, yielded as [`Slice`]s.
pub struct ArrayIter<'a> {
    bytes: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Result<Slice<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slice = Slice { bytes: self.bytes };
        let len = match slice.byte_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let narrowed = Slice {
            bytes: &self.bytes[..len],
        };
        self.bytes = &self.bytes[len..];
        self.remaining -= 1;
        Some(Ok(narrowed))
    }
}

/// Iterator over an object's `(key, value)` members, in insertion order.
pub struct ObjectIter<'a> {
    bytes: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for ObjectIter<'a> {
    type Item = Result<(&'a str, Slice<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key_slice = Slice { bytes: self.bytes };
        let key = match key_slice.as_str() {
            Ok(k) => k,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let key_len = match key_slice.byte_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let value_bytes = &self.bytes[key_len..];
        let value_slice = Slice { bytes: value_bytes };
        let value_len = match value_slice.byte_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let value = Slice {
            bytes: &value_bytes[..value_len],
        };
        self.bytes = &value_bytes[value_len..];
        self.remaining -= 1;
        Some(Ok((key, value)))
    }
}

/// Encodes a `serde_json::Value` into a fresh [`Builder`], for readable test
/// fixtures — production code never depends on `serde_json` for this wire
/// format, only tests that want to write fixtures as JSON literals instead
/// of a sequence of `Builder` calls.
#[cfg(test)]
pub(crate) fn from_json_value(value: &serde_json::Value, builder: &mut Builder) {
    use serde_json::Value;
    match value {
        Value::Null => builder.append_null(),
        Value::Bool(b) => builder.append_bool(*b),
        Value::Number(n) => builder.append_double(n.as_f64().expect("finite JSON number")),
        Value::String(s) => builder.append_string(s),
        Value::Array(items) => {
            builder.open_array();
            for item in items {
                from_json_value(item, builder);
            }
            builder.close_array();
        }
        Value::Object(map) => {
            builder.open_object();
            for (key, item) in map {
                builder.key(key);
                from_json_value(item, builder);
            }
            builder.close_object();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Builder;

    #[test]
    fn from_json_value_builds_equivalent_slice() {
        let mut b = Builder::new();
        from_json_value(&serde_json::json!({"key": {"hello": "world", "foo": 12.0}}), &mut b);
        let bytes = b.finish();
        let s = Slice::new(&bytes).unwrap();
        let key = s.get("key").unwrap();
        assert_eq!(key.get("hello").unwrap().as_str().unwrap(), "world");
        assert_eq!(key.get("foo").unwrap().as_double().unwrap(), 12.0);
    }

    #[test]
    fn round_trips_scalars() {
        let mut b = Builder::new();
        b.append_double(3.5);
        let bytes = b.finish();
        let s = Slice::new(&bytes).unwrap();
        assert!(s.is_double());
        assert_eq!(s.as_double().unwrap(), 3.5);
    }

    #[test]
    fn round_trips_nested_object_and_array() {
        let mut b = Builder::new();
        b.open_object();
        b.key("key");
        b.open_object();
        b.key("hello");
        b.append_string("world");
        b.key("foo");
        b.append_double(12.0);
        b.close_object();
        b.close_object();
        let bytes = b.finish();
        let s = Slice::new(&bytes).unwrap();
        assert!(s.is_object());
        let key = s.get("key").unwrap();
        assert!(key.is_object());
        assert_eq!(key.get("hello").unwrap().as_str().unwrap(), "world");
        assert_eq!(key.get("foo").unwrap().as_double().unwrap(), 12.0);
        assert!(s.get("missing").unwrap().is_none());
    }

    #[test]
    fn array_iteration_preserves_order() {
        let mut b = Builder::new();
        b.open_array();
        b.append_double(1.0);
        b.append_double(2.0);
        b.append_string("three");
        b.close_array();
        let bytes = b.finish();
        let s = Slice::new(&bytes).unwrap();
        assert_eq!(s.length().unwrap(), 3);
        let collected: Vec<_> = s.iter_array().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(collected[0].as_double().unwrap(), 1.0);
        assert_eq!(collected[2].as_str().unwrap(), "three");
    }

    #[test]
    fn object_iteration_preserves_insertion_order() {
        let mut b = Builder::new();
        b.open_object();
        b.key("z");
        b.append_double(1.0);
        b.key("a");
        b.append_double(2.0);
        b.close_object();
        let bytes = b.finish();
        let s = Slice::new(&bytes).unwrap();
        let keys: Vec<&str> = s
            .iter_object()
            .unwrap()
            .map(|pair| pair.unwrap().0)
            .collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
