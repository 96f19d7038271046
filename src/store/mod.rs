//! The transactional store: owns the current root, serializes writers,
//! offers snapshot reads, and hosts the TTL reaper.
//!
//! Grounded on `original_source/store.h`'s two-mutex discipline — an outer
//! `modify` mutex serializing writers against writers, an inner shared
//! `root` lock guarding only the handle cell — and on `eidetica`'s
//! `backend::InMemoryBackend`/`database::in_memory::storage` for the Rust
//! idiom of wrapping that state in `std::sync::{Mutex, RwLock}` rather than
//! an async lock (see `DESIGN.md`).

mod errors;

pub use errors::StoreError;

use crate::node::{Node, NodeHandle};
use crate::path::Path;
use crate::transaction::{Envelope, Operation, Precondition, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

pub type Result<T> = std::result::Result<T, StoreError>;

/// Knobs the original leaves as constants; see spec.md §4.9's supplement.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How often the TTL reaper wakes to check for expired entries.
    pub ttl_poll_interval: Duration,
    /// The root the store starts with. Defaults to an empty object.
    pub initial_root: NodeHandle,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            ttl_poll_interval: Duration::from_secs(1),
            initial_root: crate::node::empty_object_handle(),
        }
    }
}

/// The outcome of [`Store::transact`]: spec.md §7 treats a failed
/// precondition as a typed negative result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactOutcome {
    Committed(NodeHandle),
    PreconditionFailed,
}

impl TransactOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactOutcome::Committed(_))
    }
}

pub struct Store {
    /// Serializes writers against writers so precondition evaluation and
    /// the publish that follows observe the same root.
    modify: Mutex<()>,
    /// Guards only the handle cell; readers take it shared, writers take
    /// it exclusively just to swap the handle.
    root: RwLock<NodeHandle>,
    /// TTL entries, kept independent of `root` so reaper bookkeeping never
    /// competes with write throughput for the root lock.
    ttl: Mutex<HashMap<Path, Instant>>,
    wake_lock: Mutex<()>,
    wake: Condvar,
    stop: AtomicBool,
    reaper: Mutex<Option<thread::JoinHandle<()>>>,
    config: StoreConfig,
}

impl Store {
    /// Creates a store with default configuration and starts its reaper
    /// thread.
    pub fn new() -> Arc<Store> {
        Store::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Arc<Store> {
        let store = Arc::new(Store {
            modify: Mutex::new(()),
            root: RwLock::new(config.initial_root.clone()),
            ttl: Mutex::new(HashMap::new()),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
            stop: AtomicBool::new(false),
            reaper: Mutex::new(None),
            config,
        });
        let weak = Arc::downgrade(&store);
        let interval = store.config.ttl_poll_interval;
        let handle = thread::spawn(move || Store::reaper_loop(weak, interval));
        *store.reaper.lock().expect("reaper handle mutex poisoned") = Some(handle);
        store
    }

    /// Snapshot read of the current root. Never blocks behind a writer's
    /// precondition evaluation — only behind the brief window where a
    /// writer is swapping the handle.
    pub fn read(&self) -> Result<NodeHandle> {
        let root = self.root.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(root.clone())
    }

    /// Applies `operations` unconditionally, publishing the new root
    /// atomically, and returns it.
    pub fn write(&self, operations: Vec<Operation>) -> Result<NodeHandle> {
        let _modify_guard = self.modify.lock().map_err(|_| StoreError::LockPoisoned)?;
        let next = self.apply(self.read()?, &operations)?;
        self.publish(next.clone())?;
        tracing::trace!(operations = operations.len(), "applied write");
        Ok(next)
    }

    /// Evaluates `transaction`'s preconditions against the current root;
    /// if all hold, applies its operations and publishes atomically. If
    /// any precondition fails, the root is left untouched.
    pub fn transact(&self, transaction: &Transaction) -> Result<TransactOutcome> {
        let _modify_guard = self.modify.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current = self.read()?;
        if !Self::fold_preconditions(&current, &transaction.preconditions) {
            tracing::debug!(client_id = %transaction.client_id, "transaction rejected: precondition failed");
            return Ok(TransactOutcome::PreconditionFailed);
        }
        let next = self.apply(current, &transaction.operations)?;
        self.publish(next.clone())?;
        tracing::trace!(client_id = %transaction.client_id, operations = transaction.operations.len(), "committed transaction");
        Ok(TransactOutcome::Committed(next))
    }

    /// Applies every transaction in `envelope` against this store, in
    /// order, via [`Store::transact`]. A later transaction observes the
    /// root published by an earlier one; the wire format is the external
    /// adapter's job, not this store's — callers parse bytes into an
    /// [`Envelope`] first (`schema::envelope_deserializer`) and hand the
    /// result here.
    pub fn apply_envelope(&self, envelope: &Envelope) -> Result<Vec<TransactOutcome>> {
        envelope
            .transactions
            .iter()
            .map(|transaction| self.transact(transaction))
            .collect()
    }

    /// Snapshot read followed by a precondition fold; does not take the
    /// writer mutex, so it never blocks behind an in-flight write's
    /// evaluation phase longer than the brief publish step.
    pub fn check(&self, preconditions: &[Precondition]) -> Result<bool> {
        let current = self.read()?;
        Ok(Self::fold_preconditions(&current, preconditions))
    }

    pub fn set_ttl(&self, path: Path, duration: Duration) -> Result<()> {
        let mut ttl = self.ttl.lock().map_err(|_| StoreError::LockPoisoned)?;
        ttl.insert(path, Instant::now() + duration);
        Ok(())
    }

    pub fn remove_ttl(&self, path: &Path) -> Result<()> {
        let mut ttl = self.ttl.lock().map_err(|_| StoreError::LockPoisoned)?;
        ttl.remove(path);
        Ok(())
    }

    /// Stops the reaper thread and waits for it to exit. Idempotent.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        {
            let _guard = self.wake_lock.lock().expect("wake mutex poisoned");
            self.wake.notify_all();
        }
        if let Some(handle) = self
            .reaper
            .lock()
            .expect("reaper handle mutex poisoned")
            .take()
        {
            let _ = handle.join();
        }
    }

    fn fold_preconditions(current: &NodeHandle, preconditions: &[Precondition]) -> bool {
        let actions: Vec<(Path, &Precondition)> = preconditions
            .iter()
            .map(|pre| (pre.path.clone(), pre))
            .collect();
        Node::fold(
            current,
            &actions,
            |pre, handle| pre.condition.test(handle),
            |acc, value| acc && value,
            true,
        )
    }

    fn apply(&self, root: NodeHandle, operations: &[Operation]) -> Result<NodeHandle> {
        let mut next = root;
        let mut ttl_updates = Vec::new();
        for op in operations {
            next = Node::transform(&next, &op.path, &|handle| op.transform.apply(handle));
            if let Some(ttl) = op.ttl {
                ttl_updates.push((op.path.clone(), ttl));
            }
        }
        if !ttl_updates.is_empty() {
            let mut ttl_map = self.ttl.lock().map_err(|_| StoreError::LockPoisoned)?;
            for (path, duration) in ttl_updates {
                ttl_map.insert(path, Instant::now() + duration);
            }
        }
        Ok(next)
    }

    fn publish(&self, next: NodeHandle) -> Result<()> {
        let mut root = self.root.write().map_err(|_| StoreError::LockPoisoned)?;
        *root = next;
        Ok(())
    }

    fn reaper_loop(weak: Weak<Store>, interval: Duration) {
        loop {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if store.stop.load(Ordering::Acquire) {
                return;
            }
            {
                let guard = store.wake_lock.lock().expect("wake mutex poisoned");
                let _ = store
                    .wake
                    .wait_timeout(guard, interval)
                    .expect("wake mutex poisoned");
            }
            if store.stop.load(Ordering::Acquire) {
                return;
            }
            store.reap_once();
        }
    }

    fn reap_once(&self) {
        let now = Instant::now();
        let expired: Vec<Path> = {
            let mut ttl = match self.ttl.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            let expired: Vec<Path> = ttl
                .iter()
                .filter(|(_, expiry)| **expiry <= now)
                .map(|(path, _)| path.clone())
                .collect();
            for path in &expired {
                ttl.remove(path);
            }
            expired
        };
        if expired.is_empty() {
            return;
        }
        let count = expired.len();
        let operations = expired
            .into_iter()
            .map(|path| Operation {
                path,
                transform: Box::new(crate::transform::remove()),
                ttl: None,
            })
            .collect();
        if let Err(err) = self.write(operations) {
            tracing::warn!(%err, "ttl reaper failed to publish batch removal");
        } else {
            tracing::debug!(count, "ttl reaper fired batch removal");
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.stop();
    }
}
