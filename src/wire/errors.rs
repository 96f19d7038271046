//! Error type for the binary wire codec.

use thiserror::Error;

/// Failures that can occur while reading a [`super::Slice`].
///
/// These are internal to the `wire` module: higher layers (the `deser`
/// deserializer DSL) never see a raw `WireError` directly, they observe a
/// "wrong kind" outcome and translate it into a
/// [`crate::deser::DeserializeError`] with their own message text, exactly
/// as `value_reader<T>::read` does in the original source.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WireError {
    /// The slice's tag byte did not match one of the known encodings.
    #[error("unknown wire tag byte: {0:#04x}")]
    UnknownTag(u8),

    /// A fixed-size field (length header, double payload, ...) ran past the
    /// end of the underlying buffer.
    #[error("truncated wire buffer: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    /// A string payload was not valid UTF-8.
    #[error("invalid utf-8 in wire string")]
    InvalidUtf8,

    /// An array index was out of bounds.
    #[error("array index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The requested accessor does not apply to this slice's kind.
    #[error("wrong wire kind: expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
}
