//! Watch channels for blocking-read invalidation.
//!
//! Every read that can go stale registers a one-shot handle keyed to the row
//! or table it touched. A commit that writes a watched key drops the trigger,
//! which wakes every handle subscribed to it. Handles must be registered
//! before the snapshot is taken: a write racing the read then produces a
//! spurious wake instead of a missed one.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

/// Identifies what a watch handle is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchKey {
    /// A single row, by table and primary key.
    Row { table: &'static str, key: String },
    /// A whole table, fired by any write into it. Used by range and
    /// secondary-index reads.
    Table(&'static str),
}

impl WatchKey {
    pub fn row(table: &'static str, key: impl Into<String>) -> Self {
        WatchKey::Row {
            table,
            key: key.into(),
        }
    }
}

/// A one-shot notification tied to a previously read row or range.
#[derive(Debug)]
pub struct WatchHandle {
    rx: watch::Receiver<()>,
}

impl WatchHandle {
    /// Resolves once the watched row or range has been written. May resolve
    /// immediately if the write raced the read.
    pub async fn triggered(mut self) {
        // The registry fires by dropping the sender; a closed channel counts
        // as triggered just like a value change.
        let _ = self.rx.changed().await;
    }
}

/// Receives watch handles from read operations.
///
/// The store only needs one capability from an aggregator: accept a handle.
/// `WatchSet` is the standard implementation; callers with other wake-up
/// machinery can adapt it behind this trait.
pub trait WatchSink {
    fn register(&mut self, handle: WatchHandle);
}

/// Collects watch handles across several reads so a caller can block until
/// any of the underlying rows change.
#[derive(Debug, Default)]
pub struct WatchSet {
    handles: Vec<WatchHandle>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait until any registered handle fires. An empty set never resolves.
    /// Cancellation and timeouts belong to the caller, typically via
    /// `tokio::time::timeout` or `select!`.
    pub async fn changed(self) {
        if self.handles.is_empty() {
            return futures::future::pending().await;
        }
        let waits: Vec<_> = self
            .handles
            .into_iter()
            .map(|h| Box::pin(h.triggered()))
            .collect();
        futures::future::select_all(waits).await;
    }
}

impl WatchSink for WatchSet {
    fn register(&mut self, handle: WatchHandle) {
        self.handles.push(handle);
    }
}

/// Owns the live triggers, one per watched key.
///
/// Triggers are created lazily on subscription and removed when fired, so the
/// map only ever holds keys somebody read since the last write to them.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    triggers: Mutex<HashMap<WatchKey, watch::Sender<()>>>,
}

impl WatchRegistry {
    pub fn subscribe(&self, key: WatchKey) -> WatchHandle {
        let mut triggers = self.lock();
        let sender = triggers
            .entry(key)
            .or_insert_with(|| watch::channel(()).0);
        WatchHandle {
            rx: sender.subscribe(),
        }
    }

    /// Fire the trigger for a key, waking every handle subscribed to it.
    pub fn fire(&self, key: &WatchKey) {
        // Dropping the sender closes the channel, the one-shot equivalent of
        // a broadcast.
        self.lock().remove(key);
    }

    /// Drop triggers nobody is subscribed to anymore.
    pub fn prune(&self) {
        self.lock().retain(|_, sender| sender.receiver_count() > 0);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WatchKey, watch::Sender<()>>> {
        // Triggers carry no data; a panicked holder cannot leave them
        // inconsistent.
        self.triggers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
