use std::sync::Arc;

use crate::core::Result;
use crate::model::Namespace;
use crate::state::store::StateStore;
use crate::storage::table::{Record, SecondaryCursor};
use crate::storage::watch::{WatchKey, WatchSink};

// Namespaces are owned by their own subsystem; the store carries them so
// reconciliation can resolve quota membership inside the same transaction
// that rewrites a usage record. Changing a namespace's quota binding does not
// refresh usage by itself; callers re-upsert the spec or usage afterwards.
impl StateStore {
    /// Create or update a set of namespaces as one atomic batch.
    pub fn upsert_namespaces(&self, index: u64, namespaces: Vec<Namespace>) -> Result<()> {
        let mut txn = self.write_txn(index);

        for mut namespace in namespaces {
            namespace.validate()?;

            if let Some(existing) = txn.tables().namespaces.get(&namespace.name) {
                namespace.create_index = existing.create_index;
                namespace.modify_index = index;
            } else {
                namespace.create_index = index;
                namespace.modify_index = index;
            }

            txn.insert_namespace(namespace);
        }

        txn.put_index(Namespace::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Look up a namespace by name.
    pub fn namespace_by_name(&self, ws: &mut dyn WatchSink, name: &str) -> Option<Arc<Namespace>> {
        ws.register(self.db.watch(WatchKey::row(Namespace::TABLE, name)));
        self.read_txn().tables().namespaces.get(name).cloned()
    }

    /// Iterate over the namespaces bound to a quota specification.
    pub fn namespaces_by_quota(
        &self,
        ws: &mut dyn WatchSink,
        quota: &str,
    ) -> SecondaryCursor<Namespace> {
        ws.register(self.db.watch(WatchKey::Table(Namespace::TABLE)));
        self.read_txn().tables().namespaces.by_secondary(quota)
    }
}
