//! Structured errors for the deserializer DSL, carrying a path-like trace
//! back to the failing sub-value — translated from
//! `examples/original_source/deserialize/errors.h`.

use std::fmt;

/// One step of the trace attached to a [`DeserializeError`]: either "while
/// reading field `name`" or "while reading index `index`", pushed by
/// [`DeserializeError::wrap`] as the error unwinds back up through nested
/// combinators (`attribute`, `array`, `map`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceStep {
    Field(String),
    Index(usize),
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStep::Field(name) => write!(f, ".{name}"),
            TraceStep::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A deserialization failure, with a human-readable message at the point of
/// failure and a trace of the path taken to reach it, rendered the way the
/// original's `error::trace()` renders a dotted/bracketed path
/// (`.delta: value is not a double`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError {
    message: String,
    trace: Vec<TraceStep>,
}

impl DeserializeError {
    pub fn new(message: impl Into<String>) -> Self {
        DeserializeError {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Pushes one more trace step as the error unwinds through an enclosing
    /// combinator. Steps accumulate innermost-first; [`Self::render`]
    /// prints them in the order they were pushed, which is outer-to-inner
    /// once the whole stack has unwound (matching the original's
    /// `wrap`/`trace` pair).
    pub fn wrap(mut self, step: TraceStep) -> Self {
        self.trace.push(step);
        self
    }

    pub fn wrap_field(self, name: impl Into<String>) -> Self {
        self.wrap(TraceStep::Field(name.into()))
    }

    pub fn wrap_index(self, index: usize) -> Self {
        self.wrap(TraceStep::Index(index))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> &[TraceStep] {
        &self.trace
    }

    /// Renders the full trace, outermost field first, ending in the
    /// message at the failing leaf: e.g. `.delta: value is not a double`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in self.trace.iter().rev() {
            out.push_str(&step.to_string());
        }
        out.push_str(": ");
        out.push_str(&self.message);
        out
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::error::Error for DeserializeError {}
