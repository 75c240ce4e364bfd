use crate::core::StoreConfig;
use crate::state::restore::StateRestore;
use crate::storage::db::MemDb;
use crate::transaction::{ReadTxn, WriteTxn};

/// The authoritative in-memory state store for the quota subsystem.
///
/// All writes go through exclusive, index-stamped transactions; reads operate
/// on immutable snapshots and register watch handles so callers can block
/// until something they read changes.
pub struct StateStore {
    pub(crate) db: MemDb,
    pub(crate) config: StoreConfig,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            db: MemDb::new(),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a point-in-time read transaction.
    pub fn read_txn(&self) -> ReadTxn {
        ReadTxn::begin(&self.db)
    }

    pub(crate) fn write_txn(&self, index: u64) -> WriteTxn<'_> {
        WriteTxn::begin(&self.db, index)
    }

    /// Begin a bulk load from a persisted snapshot. Records inserted through
    /// the returned handle skip ledger bookkeeping; nothing is visible until
    /// its `commit`.
    pub fn restore(&self) -> StateRestore<'_> {
        StateRestore::new(self.write_txn(0))
    }

    /// The highest write index applied to a table, or zero if the table has
    /// never been written.
    pub fn table_index(&self, table: &str) -> u64 {
        self.read_txn()
            .tables()
            .index
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    /// Every index ledger entry, for snapshot and replication collaborators
    /// deciding where to catch up from.
    pub fn table_indexes(&self) -> impl Iterator<Item = (String, u64)> {
        self.read_txn().tables().index.clone().into_iter()
    }
}
