use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{Resources, Result, StoreError};
use crate::storage::table::Record;

/// A quota specification: a named set of per-region resource ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSpec {
    pub name: String,
    pub description: String,
    pub limits: Vec<QuotaLimit>,
    /// Content digest over the whole specification.
    pub hash: Vec<u8>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// A single resource ceiling scoped to one region.
///
/// The hash is the limit's identity: usage records key their aggregates by it,
/// and a change to the limit's definition produces a new hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimit {
    pub region: String,
    pub region_limit: Resources,
    pub hash: Vec<u8>,
}

/// Live consumption tracked against a quota specification.
///
/// `used` maps a limit hash to a limit-shaped record whose `region_limit`
/// holds the aggregated consumption, not the configured ceiling. Keys are raw
/// digest bytes and are not required to be printable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub name: String,
    pub used: HashMap<Vec<u8>, QuotaLimit>,
    pub create_index: u64,
    pub modify_index: u64,
}

impl QuotaSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            limits: Vec::new(),
            hash: Vec::new(),
            create_index: 0,
            modify_index: 0,
        }
    }

    pub fn with_limit(mut self, limit: QuotaLimit) -> Self {
        self.limits.push(limit);
        self
    }

    /// Compute and store the content hash, hashing any limits that are still
    /// missing theirs first.
    pub fn set_hash(&mut self) {
        for limit in &mut self.limits {
            if limit.hash.is_empty() {
                limit.set_hash();
            }
        }
        let mut h = Sha256::new();
        h.update(self.name.as_bytes());
        h.update([0]);
        h.update(self.description.as_bytes());
        for limit in &self.limits {
            h.update([0]);
            h.update(&limit.hash);
        }
        self.hash = h.finalize().to_vec();
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::invalid(
                "quota specification",
                "",
                "name must not be empty",
            ));
        }
        for limit in &self.limits {
            if limit.region.is_empty() {
                return Err(StoreError::invalid(
                    "quota specification",
                    self.name.clone(),
                    "limit region must not be empty",
                ));
            }
        }
        Ok(())
    }
}

impl QuotaLimit {
    pub fn new(region: impl Into<String>, region_limit: Resources) -> Self {
        Self {
            region: region.into(),
            region_limit,
            hash: Vec::new(),
        }
    }

    /// Compute and store the content hash over the limit definition.
    pub fn set_hash(&mut self) {
        let mut h = Sha256::new();
        h.update(self.region.as_bytes());
        h.update([0]);
        h.update(self.region_limit.cpu.to_le_bytes());
        h.update(self.region_limit.memory_mb.to_le_bytes());
        h.update(self.region_limit.disk_mb.to_le_bytes());
        h.update(self.region_limit.iops.to_le_bytes());
        self.hash = h.finalize().to_vec();
    }
}

impl QuotaUsage {
    /// Derive a fresh, empty usage record for a specification. Aggregates are
    /// filled in by reconciliation.
    pub fn from_spec(spec: &QuotaSpec) -> Self {
        Self {
            name: spec.name.clone(),
            used: HashMap::with_capacity(spec.limits.len()),
            create_index: 0,
            modify_index: 0,
        }
    }

    /// Diff this usage against a specification's limit set.
    ///
    /// Returns the limits that need (re)computation because their hash is not
    /// yet reflected here, and the hashes to drop because no limit in the
    /// spec carries them anymore.
    pub fn diff_limits(&self, spec: &QuotaSpec) -> (Vec<QuotaLimit>, Vec<Vec<u8>>) {
        let create = spec
            .limits
            .iter()
            .filter(|l| !self.used.contains_key(&l.hash))
            .cloned()
            .collect();

        let spec_hashes: HashSet<&[u8]> = spec.limits.iter().map(|l| l.hash.as_slice()).collect();
        let remove = self
            .used
            .keys()
            .filter(|k| !spec_hashes.contains(k.as_slice()))
            .cloned()
            .collect();

        (create, remove)
    }
}

impl Record for QuotaSpec {
    const TABLE: &'static str = "quota_specs";

    fn key(&self) -> &str {
        &self.name
    }
}

impl Record for QuotaUsage {
    const TABLE: &'static str = "quota_usages";

    fn key(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_with_limits(regions: &[&str]) -> QuotaSpec {
        let mut spec = QuotaSpec::new("api-team");
        for region in regions {
            spec = spec.with_limit(QuotaLimit::new(
                *region,
                Resources {
                    cpu: 1000,
                    memory_mb: 1024,
                    ..Default::default()
                },
            ));
        }
        spec.set_hash();
        spec
    }

    #[test]
    fn test_spec_hash_covers_limits() {
        let a = spec_with_limits(&["global"]);
        let mut b = spec_with_limits(&["global"]);
        assert_eq!(a.hash, b.hash);

        b.limits[0].region_limit.cpu = 2000;
        b.limits[0].hash.clear();
        b.hash.clear();
        b.set_hash();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_diff_limits_fresh_usage() {
        let spec = spec_with_limits(&["global", "eu-west"]);
        let usage = QuotaUsage::from_spec(&spec);

        let (create, remove) = usage.diff_limits(&spec);
        assert_eq!(create.len(), 2);
        assert!(remove.is_empty());
    }

    #[test]
    fn test_diff_limits_detects_stale_entries() {
        let old = spec_with_limits(&["global"]);
        let mut usage = QuotaUsage::from_spec(&old);
        usage
            .used
            .insert(old.limits[0].hash.clone(), old.limits[0].clone());

        // Same region, different ceiling: new hash replaces the old one.
        let mut new = spec_with_limits(&["global"]);
        new.limits[0].region_limit.cpu = 9999;
        new.limits[0].hash.clear();
        new.set_hash();

        let (create, remove) = usage.diff_limits(&new);
        assert_eq!(create.len(), 1);
        assert_eq!(create[0].hash, new.limits[0].hash);
        assert_eq!(remove, vec![old.limits[0].hash.clone()]);
    }

    #[test]
    fn test_diff_limits_unchanged_spec_is_noop() {
        let spec = spec_with_limits(&["global"]);
        let mut usage = QuotaUsage::from_spec(&spec);
        usage
            .used
            .insert(spec.limits[0].hash.clone(), spec.limits[0].clone());

        let (create, remove) = usage.diff_limits(&spec);
        assert!(create.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_region() {
        let mut spec = QuotaSpec::new("api-team");
        spec.limits
            .push(QuotaLimit::new("", Resources::default()));
        assert!(spec.validate().is_err());
    }
}
