use tracing::debug;

use crate::model::{Allocation, Namespace, Policy, QuotaSpec, QuotaUsage};
use crate::transaction::WriteTxn;

/// Bulk loader used while rebuilding the store from a persisted snapshot.
///
/// Inserts go straight into one write transaction and skip the per-batch
/// ledger bookkeeping; the snapshot already knows each table's index, and the
/// loader replays it through `index_restore`. Dropping the loader without
/// committing discards the partial load.
pub struct StateRestore<'a> {
    txn: WriteTxn<'a>,
}

impl<'a> StateRestore<'a> {
    pub(crate) fn new(txn: WriteTxn<'a>) -> Self {
        Self { txn }
    }

    pub fn policy_restore(&mut self, policy: Policy) {
        self.txn.insert_policy(policy);
    }

    pub fn quota_spec_restore(&mut self, spec: QuotaSpec) {
        self.txn.insert_quota_spec(spec);
    }

    pub fn quota_usage_restore(&mut self, usage: QuotaUsage) {
        self.txn.insert_quota_usage(usage);
    }

    pub fn namespace_restore(&mut self, namespace: Namespace) {
        self.txn.insert_namespace(namespace);
    }

    pub fn alloc_restore(&mut self, alloc: Allocation) {
        self.txn.insert_alloc(alloc);
    }

    /// Replay one index ledger entry from the snapshot.
    pub fn index_restore(&mut self, table: &str, index: u64) {
        self.txn.put_index(table, index);
    }

    /// Publish the loaded state atomically.
    pub fn commit(self) {
        debug!("snapshot restore commit");
        self.txn.commit();
    }
}
