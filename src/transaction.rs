//! Typed results the deserializer produces and the store consumes.
//!
//! Grounded on spec.md §3.3/§4.6 and `original_source/agent.h`'s
//! `envelope`/`conditional_modification` shapes, reworked into concrete
//! structs instead of the original's unfinished stub classes.

use crate::condition::Condition;
use crate::path::Path;
use crate::transform::Transform;
use std::time::Duration;

/// A `(path, predicate)` pair checked before a transaction's operations
/// run.
pub struct Precondition {
    pub path: Path,
    pub condition: Box<dyn Condition + Send + Sync>,
}

/// A `(path, transformation)` pair applied as part of a transaction. `ttl`
/// is `Some` when the schema's `"set"` operation carried a `ttl` field,
/// telling the store to also register a TTL entry at `path`.
pub struct Operation {
    pub path: Path,
    pub transform: Box<dyn Transform + Send + Sync>,
    pub ttl: Option<Duration>,
}

/// An ordered list of operations plus preconditions plus a client id,
/// applied atomically.
pub struct Transaction {
    pub operations: Vec<Operation>,
    pub preconditions: Vec<Precondition>,
    pub client_id: String,
}

/// An ordered list of transactions submitted together. Per spec.md §2, the
/// core applies them one by one.
pub struct Envelope {
    pub transactions: Vec<Transaction>,
}
