// ============================================================================
// quotastate
// ============================================================================
//
// Versioned in-memory state store for a cluster orchestrator's resource-quota
// subsystem. Quota specifications, the live usage aggregated against them,
// and governance policies live in typed tables with monotonic per-table write
// indexes. Writers apply atomic batches through an exclusive transaction;
// readers work on immutable snapshots and can block on watch handles until
// something they read changes.

//! # Example
//!
//! ```
//! use quotastate::{QuotaLimit, QuotaSpec, Resources, StateStore, StoreConfig, WatchSet};
//!
//! let store = StateStore::new(StoreConfig::new("global"));
//!
//! let limit = QuotaLimit::new(
//!     "global",
//!     Resources {
//!         cpu: 4000,
//!         memory_mb: 8192,
//!         ..Default::default()
//!     },
//! );
//! let spec = QuotaSpec::new("api-team").with_limit(limit);
//! store.upsert_quota_specs(10, vec![spec]).unwrap();
//!
//! // The paired usage record was created and reconciled in the same
//! // transaction.
//! let mut ws = WatchSet::new();
//! let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
//! assert_eq!(usage.create_index, 10);
//! assert_eq!(usage.used.len(), 1);
//! ```

pub mod core;
pub mod model;
pub mod state;
pub mod storage;
pub mod transaction;

// Re-export the main types for convenience
pub use crate::core::{Resources, Result, StoreConfig, StoreError};
pub use model::{
    Allocation, ClientStatus, DesiredStatus, Namespace, Policy, QuotaLimit, QuotaSpec, QuotaUsage,
};
pub use state::{StateRestore, StateStore};
pub use storage::watch::{WatchHandle, WatchSet, WatchSink};
