use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use im::OrdMap;

use crate::model::{Allocation, Namespace, Policy, QuotaSpec, QuotaUsage};
use crate::storage::table::Table;
use crate::storage::watch::{WatchHandle, WatchKey, WatchRegistry};

/// Name of the index ledger table.
pub const TABLE_INDEX: &str = "index";

/// The complete table state at one point in time.
///
/// Every field is a persistent structure, so cloning the whole thing is O(1).
/// A committed root is immutable; writers clone it, mutate the clone, and
/// publish it as the new root.
#[derive(Clone, Default)]
pub struct Tables {
    pub policies: Table<Policy>,
    pub quota_specs: Table<QuotaSpec>,
    pub quota_usages: Table<QuotaUsage>,
    pub namespaces: Table<Namespace>,
    pub allocs: Table<Allocation>,
    /// Index ledger: table name to the highest write index applied to it.
    pub index: OrdMap<String, u64>,
}

/// The in-memory database root: the current table state, the writer gate, and
/// the watch triggers.
#[derive(Default)]
pub struct MemDb {
    root: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
    watches: WatchRegistry,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current committed state. Readers keep the `Arc` for as long as
    /// they need a consistent view; later commits never touch it.
    pub fn snapshot(&self) -> Arc<Tables> {
        // The root is only ever replaced wholesale under the write guard, so
        // a poisoned lock cannot expose partial state.
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe a watch handle for a row or table.
    pub fn watch(&self, key: WatchKey) -> WatchHandle {
        self.watches.subscribe(key)
    }

    /// Acquire the writer gate and a working copy of the current state.
    /// Exactly one writer holds the gate at a time.
    pub(crate) fn begin_write(&self) -> (MutexGuard<'_, ()>, Tables) {
        let gate = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let tables = (*self.snapshot()).clone();
        (gate, tables)
    }

    /// Publish a new root and fire the given watch keys. Called with the
    /// writer gate still held.
    pub(crate) fn publish(&self, tables: Tables, dirty: &[WatchKey]) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(tables);

        let mut tables_touched: Vec<&'static str> = Vec::new();
        for key in dirty {
            self.watches.fire(key);
            if let WatchKey::Row { table, .. } = key
                && !tables_touched.contains(table)
            {
                tables_touched.push(*table);
            }
        }
        for table in tables_touched {
            self.watches.fire(&WatchKey::Table(table));
        }
        self.watches.prune();
    }
}
