// ============================================================================
// Transactions
// ============================================================================
//
// One writer at a time, snapshot readers. A write transaction owns the writer
// gate and a working copy of the table state; dropping it without calling
// `commit` discards every change, so abort is the default on any early-return
// path. `commit` consumes the transaction, which makes a second commit or a
// write-after-commit unrepresentable.

use std::sync::{Arc, MutexGuard};

use tracing::debug;

use crate::model::{Allocation, Namespace, Policy, QuotaSpec, QuotaUsage};
use crate::storage::db::{MemDb, TABLE_INDEX, Tables};
use crate::storage::table::Record;
use crate::storage::watch::WatchKey;

/// An exclusive write transaction stamped with the index its mutations carry.
pub struct WriteTxn<'db> {
    db: &'db MemDb,
    _gate: MutexGuard<'db, ()>,
    index: u64,
    tables: Tables,
    dirty: Vec<WatchKey>,
}

impl<'db> WriteTxn<'db> {
    pub(crate) fn begin(db: &'db MemDb, index: u64) -> Self {
        let (gate, tables) = db.begin_write();
        Self {
            db,
            _gate: gate,
            index,
            tables,
            dirty: Vec::new(),
        }
    }

    /// The write index this transaction stamps onto records and ledger
    /// entries.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The transaction's working state: the committed snapshot plus every
    /// mutation applied through this transaction so far.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn insert_policy(&mut self, policy: Policy) {
        self.touch(Policy::TABLE, policy.key());
        self.tables.policies.insert(policy);
    }

    pub fn remove_policy(&mut self, name: &str) {
        if self.tables.policies.remove(name).is_some() {
            self.touch(Policy::TABLE, name);
        }
    }

    pub fn insert_quota_spec(&mut self, spec: QuotaSpec) {
        self.touch(QuotaSpec::TABLE, spec.key());
        self.tables.quota_specs.insert(spec);
    }

    pub fn remove_quota_spec(&mut self, name: &str) {
        if self.tables.quota_specs.remove(name).is_some() {
            self.touch(QuotaSpec::TABLE, name);
        }
    }

    pub fn insert_quota_usage(&mut self, usage: QuotaUsage) {
        self.touch(QuotaUsage::TABLE, usage.key());
        self.tables.quota_usages.insert(usage);
    }

    pub fn remove_quota_usage(&mut self, name: &str) {
        if self.tables.quota_usages.remove(name).is_some() {
            self.touch(QuotaUsage::TABLE, name);
        }
    }

    pub fn insert_namespace(&mut self, namespace: Namespace) {
        self.touch(Namespace::TABLE, namespace.key());
        self.tables.namespaces.insert(namespace);
    }

    pub fn insert_alloc(&mut self, alloc: Allocation) {
        self.touch(Allocation::TABLE, alloc.key());
        self.tables.allocs.insert(alloc);
    }

    /// Write the index ledger entry for a table. Batch operations call this
    /// once per touched table, after every record write has succeeded.
    pub fn put_index(&mut self, table: &str, index: u64) {
        self.dirty.push(WatchKey::Row {
            table: TABLE_INDEX,
            key: table.to_string(),
        });
        self.tables.index.insert(table.to_string(), index);
    }

    /// Discard the transaction. Equivalent to dropping it; spelled out for
    /// call sites that want the abort visible.
    pub fn abort(self) {}

    /// Atomically publish every change and wake the watchers of each touched
    /// row and table.
    pub fn commit(self) {
        debug!(index = self.index, writes = self.dirty.len(), "commit");
        self.db.publish(self.tables, &self.dirty);
    }

    fn touch(&mut self, table: &'static str, key: &str) {
        self.dirty.push(WatchKey::row(table, key));
    }
}

/// A point-in-time read transaction. Never blocks the writer and is never
/// invalidated by later commits.
pub struct ReadTxn {
    tables: Arc<Tables>,
}

impl ReadTxn {
    pub(crate) fn begin(db: &MemDb) -> Self {
        Self {
            tables: db.snapshot(),
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_without_commit_discards_changes() {
        let db = MemDb::new();
        {
            let mut txn = WriteTxn::begin(&db, 1);
            txn.insert_policy(Policy::new("p1", "submit-job"));
        }
        assert!(db.snapshot().policies.is_empty());
    }

    #[test]
    fn test_commit_publishes_atomically() {
        let db = MemDb::new();
        let mut txn = WriteTxn::begin(&db, 1);
        txn.insert_policy(Policy::new("p1", "submit-job"));
        txn.put_index(Policy::TABLE, 1);

        // Not visible until commit.
        assert!(db.snapshot().policies.is_empty());
        txn.commit();

        let snap = db.snapshot();
        assert!(snap.policies.get("p1").is_some());
        assert_eq!(snap.index.get(Policy::TABLE), Some(&1));
    }

    #[test]
    fn test_read_txn_is_point_in_time() {
        let db = MemDb::new();
        let mut txn = WriteTxn::begin(&db, 1);
        txn.insert_policy(Policy::new("p1", "submit-job"));
        txn.commit();

        let read = ReadTxn::begin(&db);
        let mut txn = WriteTxn::begin(&db, 2);
        txn.remove_policy("p1");
        txn.commit();

        assert!(read.tables().policies.get("p1").is_some());
        assert!(db.snapshot().policies.get("p1").is_none());
    }

    #[test]
    fn test_explicit_abort() {
        let db = MemDb::new();
        let mut txn = WriteTxn::begin(&db, 1);
        txn.insert_policy(Policy::new("p1", "submit-job"));
        txn.abort();
        assert!(db.snapshot().policies.is_empty());
    }
}
