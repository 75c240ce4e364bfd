use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::core::{Resources, Result, StoreError};
use crate::model::{QuotaLimit, QuotaSpec, QuotaUsage};
use crate::state::store::StateStore;
use crate::storage::table::{Record, TableCursor};
use crate::storage::watch::{WatchKey, WatchSink};
use crate::transaction::WriteTxn;

impl StateStore {
    /// Create or update a set of quota specifications as one atomic batch.
    ///
    /// A first-time specification gets a paired usage record created in the
    /// same transaction, fully reconciled against the current allocation
    /// load. Updating an existing specification incrementally reconciles its
    /// usage: only limits that were added or changed are recomputed, and
    /// entries for untouched limits are carried over as they were.
    pub fn upsert_quota_specs(&self, index: u64, specs: Vec<QuotaSpec>) -> Result<()> {
        let mut txn = self.write_txn(index);

        for mut spec in specs {
            spec.validate()?;

            // Hashes are normally computed upstream; fill in any that are
            // missing as defense in depth.
            for limit in &mut spec.limits {
                if limit.hash.is_empty() {
                    limit.set_hash();
                }
            }
            if spec.hash.is_empty() {
                spec.set_hash();
            }

            let existing = txn.tables().quota_specs.get(&spec.name).cloned();
            if let Some(existing) = existing {
                spec.create_index = existing.create_index;
                spec.modify_index = index;

                let mut usage = match txn.tables().quota_usages.get(&spec.name) {
                    Some(usage) => (**usage).clone(),
                    None => return Err(StoreError::MissingQuotaUsage(spec.name.clone())),
                };
                self.reconcile_quota_usage(index, &txn, &mut usage, &spec, false);
                txn.insert_quota_usage(usage);
                txn.insert_quota_spec(spec);
            } else {
                spec.create_index = index;
                spec.modify_index = index;

                // The usage record is derived after the spec is in place so
                // the usage path sees it.
                let usage = QuotaUsage::from_spec(&spec);
                txn.insert_quota_spec(spec);
                self.upsert_quota_usage_impl(index, &mut txn, usage)?;
            }
        }

        txn.put_index(QuotaSpec::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Delete the quota specifications with the given names, along with their
    /// paired usage records, as one atomic batch.
    pub fn delete_quota_specs(&self, index: u64, names: &[String]) -> Result<()> {
        let mut txn = self.write_txn(index);

        for name in names {
            txn.remove_quota_spec(name);
            Self::delete_quota_usage_impl(index, &mut txn, name);
        }

        txn.put_index(QuotaSpec::TABLE, index);
        txn.commit();
        Ok(())
    }

    /// Create or update a set of quota usage records as one atomic batch.
    ///
    /// Each record is fully rebuilt against its specification, which must
    /// already exist. This is the administrative counterpart of the refresh
    /// that spec upserts perform implicitly.
    pub fn upsert_quota_usages(&self, index: u64, usages: Vec<QuotaUsage>) -> Result<()> {
        let mut txn = self.write_txn(index);

        for usage in usages {
            self.upsert_quota_usage_impl(index, &mut txn, usage)?;
        }

        txn.commit();
        Ok(())
    }

    /// Delete the quota usage records with the given names as one atomic
    /// batch, leaving their specifications in place. Administrative and
    /// corrective use only.
    pub fn delete_quota_usages(&self, index: u64, names: &[String]) -> Result<()> {
        let mut txn = self.write_txn(index);

        for name in names {
            Self::delete_quota_usage_impl(index, &mut txn, name);
        }

        txn.commit();
        Ok(())
    }

    fn upsert_quota_usage_impl(
        &self,
        index: u64,
        txn: &mut WriteTxn<'_>,
        mut usage: QuotaUsage,
    ) -> Result<()> {
        if let Some(existing) = txn.tables().quota_usages.get(&usage.name) {
            usage.create_index = existing.create_index;
            usage.modify_index = index;
        } else {
            usage.create_index = index;
            usage.modify_index = index;
        }

        let spec = txn
            .tables()
            .quota_specs
            .get(&usage.name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownQuotaSpec(usage.name.clone()))?;

        self.reconcile_quota_usage(index, txn, &mut usage, &spec, true);

        txn.insert_quota_usage(usage);
        txn.put_index(QuotaUsage::TABLE, index);
        Ok(())
    }

    fn delete_quota_usage_impl(index: u64, txn: &mut WriteTxn<'_>, name: &str) {
        txn.remove_quota_usage(name);
        txn.put_index(QuotaUsage::TABLE, index);
    }

    /// Recompute a usage record's aggregates from its specification and the
    /// live allocation load, inside the caller's open transaction.
    ///
    /// With `all_limits` every limit in the spec is treated as newly added
    /// and the map is rebuilt from scratch; otherwise only limits added or
    /// changed since the last reconciliation are recomputed and unrelated
    /// entries stay untouched.
    fn reconcile_quota_usage(
        &self,
        index: u64,
        txn: &WriteTxn<'_>,
        usage: &mut QuotaUsage,
        spec: &QuotaSpec,
        all_limits: bool,
    ) {
        usage.modify_index = index;

        if all_limits {
            usage.used = HashMap::with_capacity(spec.limits.len());
        }

        let (create, remove) = usage.diff_limits(spec);
        for hash in remove {
            usage.used.remove(&hash);
        }

        // Only aggregate limits for the local region; other regions count
        // their own allocations. Specs are expected to carry at most one
        // limit per region, so the first pending local limit wins.
        let Some(spec_limit) = create.into_iter().find(|l| l.region == self.config.region)
        else {
            return;
        };

        let mut usage_limit = QuotaLimit {
            region: spec_limit.region,
            region_limit: Resources::default(),
            hash: spec_limit.hash,
        };

        let tables = txn.tables();
        for namespace in tables.namespaces.by_secondary(&spec.name) {
            for alloc in tables.allocs.by_secondary(&namespace.name) {
                if !alloc.is_terminal() {
                    usage_limit.region_limit.add(&alloc.resources);
                }
            }
        }

        trace!(
            spec = %spec.name,
            region = %usage_limit.region,
            cpu = usage_limit.region_limit.cpu,
            memory_mb = usage_limit.region_limit.memory_mb,
            "reconciled quota usage"
        );
        usage.used.insert(usage_limit.hash.clone(), usage_limit);
    }

    /// Look up a quota specification by name.
    pub fn quota_spec_by_name(&self, ws: &mut dyn WatchSink, name: &str) -> Option<Arc<QuotaSpec>> {
        ws.register(self.db.watch(WatchKey::row(QuotaSpec::TABLE, name)));
        self.read_txn().tables().quota_specs.get(name).cloned()
    }

    /// Look up quota specifications whose name starts with the given prefix,
    /// in lexicographic order.
    pub fn quota_specs_by_name_prefix(
        &self,
        ws: &mut dyn WatchSink,
        prefix: &str,
    ) -> TableCursor<QuotaSpec> {
        ws.register(self.db.watch(WatchKey::Table(QuotaSpec::TABLE)));
        self.read_txn().tables().quota_specs.prefix(prefix)
    }

    /// Iterate over every quota specification.
    pub fn quota_specs(&self, ws: &mut dyn WatchSink) -> TableCursor<QuotaSpec> {
        ws.register(self.db.watch(WatchKey::Table(QuotaSpec::TABLE)));
        self.read_txn().tables().quota_specs.iter()
    }

    /// Look up a quota usage record by name.
    pub fn quota_usage_by_name(
        &self,
        ws: &mut dyn WatchSink,
        name: &str,
    ) -> Option<Arc<QuotaUsage>> {
        ws.register(self.db.watch(WatchKey::row(QuotaUsage::TABLE, name)));
        self.read_txn().tables().quota_usages.get(name).cloned()
    }

    /// Look up quota usage records whose name starts with the given prefix,
    /// in lexicographic order.
    pub fn quota_usages_by_name_prefix(
        &self,
        ws: &mut dyn WatchSink,
        prefix: &str,
    ) -> TableCursor<QuotaUsage> {
        ws.register(self.db.watch(WatchKey::Table(QuotaUsage::TABLE)));
        self.read_txn().tables().quota_usages.prefix(prefix)
    }

    /// Iterate over every quota usage record.
    pub fn quota_usages(&self, ws: &mut dyn WatchSink) -> TableCursor<QuotaUsage> {
        ws.register(self.db.watch(WatchKey::Table(QuotaUsage::TABLE)));
        self.read_txn().tables().quota_usages.iter()
    }
}
