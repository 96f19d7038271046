//! Error type for the transactional store.

use std::fmt;

/// Failures the store can report. A failed precondition is deliberately
/// *not* one of these — spec.md §7 treats it as a typed negative result
/// (`transact` returning the absent handle), not an error.
#[derive(Debug)]
pub enum StoreError {
    /// A reader or writer observed a poisoned lock — another thread
    /// panicked while holding it. The store cannot recover a torn write,
    /// so this is fatal to the caller.
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned => write!(f, "store lock poisoned by a panicking thread"),
        }
    }
}

impl std::error::Error for StoreError {}
