use std::sync::Arc;

use crate::core::Result;
use crate::model::Allocation;
use crate::state::store::StateStore;
use crate::storage::table::{Record, SecondaryCursor};
use crate::storage::watch::{WatchKey, WatchSink};

// Allocations are owned by the scheduler; the store carries the slice of them
// that quota aggregation reads.
impl StateStore {
    /// Create or update a set of allocations as one atomic batch.
    pub fn upsert_allocs(&self, index: u64, allocs: Vec<Allocation>) -> Result<()> {
        let mut txn = self.write_txn(index);

        for mut alloc in allocs {
            alloc.validate()?;

            if let Some(existing) = txn.tables().allocs.get(&alloc.id) {
                alloc.create_index = existing.create_index;
                alloc.modify_index = index;
            } else {
                alloc.create_index = index;
                alloc.modify_index = index;
            }

            txn.insert_alloc(alloc);
        }

        txn.put_index(Allocation::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Look up an allocation by id.
    pub fn alloc_by_id(&self, ws: &mut dyn WatchSink, id: &str) -> Option<Arc<Allocation>> {
        ws.register(self.db.watch(WatchKey::row(Allocation::TABLE, id)));
        self.read_txn().tables().allocs.get(id).cloned()
    }

    /// Iterate over the allocations placed in a namespace.
    pub fn allocs_by_namespace(
        &self,
        ws: &mut dyn WatchSink,
        namespace: &str,
    ) -> SecondaryCursor<Allocation> {
        ws.register(self.db.watch(WatchKey::Table(Allocation::TABLE)));
        self.read_txn().tables().allocs.by_secondary(namespace)
    }
}
