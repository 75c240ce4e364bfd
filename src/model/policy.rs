use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{Result, StoreError};
use crate::storage::table::Record;

/// A governance policy record.
///
/// Policies are opaque to the store: the `policy` field carries the raw rule
/// source and `scope` names the operation class it applies to. The store only
/// provides versioned CRUD; evaluation happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub description: String,
    pub scope: String,
    pub enforcement_level: String,
    /// Raw policy source.
    pub policy: String,
    /// Content digest over the policy definition. Normally precomputed by the
    /// caller; filled in on upsert when absent.
    pub hash: Vec<u8>,
    pub create_index: u64,
    pub modify_index: u64,
}

impl Policy {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            scope: scope.into(),
            enforcement_level: String::new(),
            policy: String::new(),
            hash: Vec::new(),
            create_index: 0,
            modify_index: 0,
        }
    }

    pub fn with_policy(mut self, source: impl Into<String>) -> Self {
        self.policy = source.into();
        self
    }

    /// Compute and store the content hash over the policy definition.
    pub fn set_hash(&mut self) {
        let mut h = Sha256::new();
        h.update(self.name.as_bytes());
        h.update([0]);
        h.update(self.scope.as_bytes());
        h.update([0]);
        h.update(self.enforcement_level.as_bytes());
        h.update([0]);
        h.update(self.policy.as_bytes());
        self.hash = h.finalize().to_vec();
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::invalid("policy", "", "name must not be empty"));
        }
        Ok(())
    }
}

impl Record for Policy {
    const TABLE: &'static str = "policies";

    fn key(&self) -> &str {
        &self.name
    }

    fn secondary(&self) -> Option<&str> {
        Some(&self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let mut a = Policy::new("deploy-gate", "submit-job").with_policy("main = rule { true }");
        let mut b = a.clone();
        a.set_hash();
        b.set_hash();
        assert_eq!(a.hash, b.hash);
        assert!(!a.hash.is_empty());
    }

    #[test]
    fn test_hash_tracks_content() {
        let mut a = Policy::new("deploy-gate", "submit-job").with_policy("main = rule { true }");
        let mut b = Policy::new("deploy-gate", "submit-job").with_policy("main = rule { false }");
        a.set_hash();
        b.set_hash();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let p = Policy::new("", "submit-job");
        assert!(p.validate().is_err());
    }
}
