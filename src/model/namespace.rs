use serde::{Deserialize, Serialize};

use crate::core::{Result, StoreError};
use crate::storage::table::Record;

/// A namespace groups workloads and optionally binds them to a quota
/// specification by name. Many namespaces may share one quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub description: String,
    /// Name of the quota specification this namespace draws from, if any.
    pub quota: Option<String>,
    pub create_index: u64,
    pub modify_index: u64,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            quota: None,
            create_index: 0,
            modify_index: 0,
        }
    }

    pub fn with_quota(mut self, quota: impl Into<String>) -> Self {
        self.quota = Some(quota.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::invalid(
                "namespace",
                "",
                "name must not be empty",
            ));
        }
        Ok(())
    }
}

impl Record for Namespace {
    const TABLE: &'static str = "namespaces";

    fn key(&self) -> &str {
        &self.name
    }

    fn secondary(&self) -> Option<&str> {
        self.quota.as_deref()
    }
}
