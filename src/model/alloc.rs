use serde::{Deserialize, Serialize};

use crate::core::{Resources, Result, StoreError};
use crate::storage::table::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredStatus {
    Run,
    Stop,
    Evict,
}

/// A placed unit of work inside a namespace.
///
/// Allocations are owned by the scheduler; the store only tracks enough of
/// them to aggregate quota consumption per namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub namespace: String,
    pub resources: Resources,
    pub client_status: ClientStatus,
    pub desired_status: DesiredStatus,
    pub create_index: u64,
    pub modify_index: u64,
}

impl Allocation {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>, resources: Resources) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            resources,
            client_status: ClientStatus::Pending,
            desired_status: DesiredStatus::Run,
            create_index: 0,
            modify_index: 0,
        }
    }

    pub fn with_client_status(mut self, status: ClientStatus) -> Self {
        self.client_status = status;
        self
    }

    /// Whether the allocation has stopped consuming resources. Terminal
    /// allocations never count against a quota.
    pub fn is_terminal(&self) -> bool {
        match self.desired_status {
            DesiredStatus::Stop | DesiredStatus::Evict => true,
            DesiredStatus::Run => matches!(
                self.client_status,
                ClientStatus::Complete | ClientStatus::Failed | ClientStatus::Lost
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(StoreError::invalid("allocation", "", "id must not be empty"));
        }
        if self.namespace.is_empty() {
            return Err(StoreError::invalid(
                "allocation",
                self.id.clone(),
                "namespace must not be empty",
            ));
        }
        Ok(())
    }
}

impl Record for Allocation {
    const TABLE: &'static str = "allocations";

    fn key(&self) -> &str {
        &self.id
    }

    fn secondary(&self) -> Option<&str> {
        Some(&self.namespace)
    }
}
