use std::sync::Arc;

use crate::core::Result;
use crate::model::Policy;
use crate::state::store::StateStore;
use crate::storage::table::{Record, SecondaryCursor, TableCursor};
use crate::storage::watch::{WatchKey, WatchSink};

impl StateStore {
    /// Create or update a set of policies as one atomic batch.
    pub fn upsert_policies(&self, index: u64, policies: Vec<Policy>) -> Result<()> {
        let mut txn = self.write_txn(index);

        for mut policy in policies {
            policy.validate()?;

            // Hashes are normally computed upstream; fill in any that are
            // missing as defense in depth.
            if policy.hash.is_empty() {
                policy.set_hash();
            }

            if let Some(existing) = txn.tables().policies.get(&policy.name) {
                policy.create_index = existing.create_index;
                policy.modify_index = index;
            } else {
                policy.create_index = index;
                policy.modify_index = index;
            }

            txn.insert_policy(policy);
        }

        txn.put_index(Policy::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Delete the policies with the given names as one atomic batch.
    pub fn delete_policies(&self, index: u64, names: &[String]) -> Result<()> {
        let mut txn = self.write_txn(index);

        for name in names {
            txn.remove_policy(name);
        }

        txn.put_index(Policy::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Look up a policy by name.
    pub fn policy_by_name(&self, ws: &mut dyn WatchSink, name: &str) -> Option<Arc<Policy>> {
        ws.register(self.db.watch(WatchKey::row(Policy::TABLE, name)));
        self.read_txn().tables().policies.get(name).cloned()
    }

    /// Look up policies whose name starts with the given prefix, in
    /// lexicographic order.
    pub fn policies_by_name_prefix(
        &self,
        ws: &mut dyn WatchSink,
        prefix: &str,
    ) -> TableCursor<Policy> {
        ws.register(self.db.watch(WatchKey::Table(Policy::TABLE)));
        self.read_txn().tables().policies.prefix(prefix)
    }

    /// Iterate over every policy.
    pub fn policies(&self, ws: &mut dyn WatchSink) -> TableCursor<Policy> {
        ws.register(self.db.watch(WatchKey::Table(Policy::TABLE)));
        self.read_txn().tables().policies.iter()
    }

    /// Iterate over the policies with the given scope.
    pub fn policies_by_scope(
        &self,
        ws: &mut dyn WatchSink,
        scope: &str,
    ) -> SecondaryCursor<Policy> {
        ws.register(self.db.watch(WatchKey::Table(Policy::TABLE)));
        self.read_txn().tables().policies.by_secondary(scope)
    }
}
