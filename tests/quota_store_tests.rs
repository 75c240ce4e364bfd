/// Quota specification and usage tests
///
/// Covers spec/usage lifecycle, reconciliation against namespaces and
/// allocations, incremental updates, and batch atomicity.
use quotastate::{
    Allocation, ClientStatus, Namespace, QuotaLimit, QuotaSpec, QuotaUsage, Resources, StateStore,
    StoreConfig, StoreError, WatchSet,
};

fn test_store() -> StateStore {
    StateStore::new(StoreConfig::new("global"))
}

fn limit(region: &str, cpu: u64, memory_mb: u64) -> QuotaLimit {
    let mut l = QuotaLimit::new(
        region,
        Resources {
            cpu,
            memory_mb,
            ..Default::default()
        },
    );
    l.set_hash();
    l
}

fn spec(name: &str, limits: Vec<QuotaLimit>) -> QuotaSpec {
    let mut s = QuotaSpec::new(name);
    s.limits = limits;
    s.set_hash();
    s
}

fn alloc(id: &str, namespace: &str, cpu: u64, memory_mb: u64) -> Allocation {
    Allocation::new(
        id,
        namespace,
        Resources {
            cpu,
            memory_mb,
            ..Default::default()
        },
    )
    .with_client_status(ClientStatus::Running)
}

/// Two namespaces on the quota, one namespace off it, one terminal
/// allocation that must not count.
fn seed_cluster(store: &StateStore) {
    store
        .upsert_namespaces(
            1,
            vec![
                Namespace::new("web").with_quota("api-team"),
                Namespace::new("batch").with_quota("api-team"),
                Namespace::new("other").with_quota("other-team"),
            ],
        )
        .unwrap();
    store
        .upsert_allocs(
            2,
            vec![
                alloc("a1", "web", 500, 256),
                alloc("a2", "web", 1000, 1024).with_client_status(ClientStatus::Complete),
                alloc("a3", "batch", 250, 128),
                alloc("a4", "other", 999, 999),
            ],
        )
        .unwrap();
}

#[test]
fn test_first_upsert_creates_reconciled_usage() {
    let store = test_store();
    seed_cluster(&store);

    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    let hash = s.limits[0].hash.clone();
    store.upsert_quota_specs(3, vec![s]).unwrap();

    let mut ws = WatchSet::new();
    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(usage.create_index, 3);
    assert_eq!(usage.modify_index, 3);
    assert_eq!(usage.used.len(), 1);

    // a1 + a3 count; a2 is terminal and a4 is in a foreign namespace.
    let entry = usage.used.get(&hash).unwrap();
    assert_eq!(entry.region, "global");
    assert_eq!(entry.region_limit.cpu, 750);
    assert_eq!(entry.region_limit.memory_mb, 384);

    assert_eq!(store.table_index("quota_specs"), 3);
    assert_eq!(store.table_index("quota_usages"), 3);
}

#[test]
fn test_spec_upsert_preserves_create_index() {
    let store = test_store();
    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    store.upsert_quota_specs(5, vec![s.clone()]).unwrap();
    store.upsert_quota_specs(9, vec![s]).unwrap();

    let mut ws = WatchSet::new();
    let fetched = store.quota_spec_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(fetched.create_index, 5);
    assert_eq!(fetched.modify_index, 9);
}

#[test]
fn test_incremental_reconcile_touches_only_changed_limits() {
    let store = test_store();
    seed_cluster(&store);

    let a = limit("global", 4000, 0);
    let b = limit("global", 0, 8192);
    store
        .upsert_quota_specs(10, vec![spec("api-team", vec![a.clone(), b.clone()])])
        .unwrap();

    let mut ws = WatchSet::new();
    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    // Only the first local-region limit is aggregated per call.
    assert_eq!(usage.used.len(), 1);
    let entry_a = usage.used.get(&a.hash).unwrap().clone();
    assert_eq!(entry_a.region_limit.cpu, 750);

    // Replace b; a is untouched and must carry over as-is.
    let b2 = limit("global", 0, 16384);
    store
        .upsert_quota_specs(11, vec![spec("api-team", vec![a.clone(), b2.clone()])])
        .unwrap();

    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(usage.modify_index, 11);
    assert_eq!(usage.used.len(), 2);
    assert_eq!(usage.used.get(&a.hash).unwrap(), &entry_a);
    let entry_b2 = usage.used.get(&b2.hash).unwrap().clone();
    assert_eq!(entry_b2.region_limit.cpu, 750);
    assert_eq!(entry_b2.region_limit.memory_mb, 384);

    // Replace a; its old entry is pruned, b2's is untouched.
    let a2 = limit("global", 2000, 0);
    store
        .upsert_quota_specs(12, vec![spec("api-team", vec![a2.clone(), b2.clone()])])
        .unwrap();

    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(usage.used.len(), 2);
    assert!(!usage.used.contains_key(&a.hash));
    assert!(usage.used.contains_key(&a2.hash));
    assert_eq!(usage.used.get(&b2.hash).unwrap(), &entry_b2);
}

#[test]
fn test_idempotent_reupsert_only_advances_modify_index() {
    let store = test_store();
    seed_cluster(&store);

    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    store.upsert_quota_specs(10, vec![s.clone()]).unwrap();

    let mut ws = WatchSet::new();
    let before = store.quota_usage_by_name(&mut ws, "api-team").unwrap();

    store.upsert_quota_specs(20, vec![s]).unwrap();
    let after = store.quota_usage_by_name(&mut ws, "api-team").unwrap();

    assert_eq!(after.create_index, 10);
    assert_eq!(after.modify_index, 20);
    assert_eq!(after.used, before.used);
}

#[test]
fn test_foreign_region_limits_are_not_aggregated() {
    let store = test_store();
    seed_cluster(&store);

    let s = spec("api-team", vec![limit("eu-west", 4000, 4096)]);
    store.upsert_quota_specs(3, vec![s]).unwrap();

    let mut ws = WatchSet::new();
    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(usage.create_index, 3);
    assert!(usage.used.is_empty());
}

#[test]
fn test_delete_spec_removes_paired_usage() {
    let store = test_store();
    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    store.upsert_quota_specs(3, vec![s]).unwrap();

    store
        .delete_quota_specs(7, &["api-team".to_string()])
        .unwrap();

    let mut ws = WatchSet::new();
    assert!(store.quota_spec_by_name(&mut ws, "api-team").is_none());
    assert!(store.quota_usage_by_name(&mut ws, "api-team").is_none());
    assert_eq!(store.table_index("quota_specs"), 7);
    assert_eq!(store.table_index("quota_usages"), 7);
}

#[test]
fn test_usage_upsert_rebuilds_from_spec() {
    let store = test_store();
    seed_cluster(&store);

    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    let hash = s.limits[0].hash.clone();
    store.upsert_quota_specs(3, vec![s.clone()]).unwrap();

    // Wipe the usage record, then rebuild it through the bulk entry point.
    store
        .delete_quota_usages(4, &["api-team".to_string()])
        .unwrap();
    let mut ws = WatchSet::new();
    assert!(store.quota_usage_by_name(&mut ws, "api-team").is_none());

    store
        .upsert_quota_usages(5, vec![QuotaUsage::from_spec(&s)])
        .unwrap();

    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(usage.create_index, 5);
    assert_eq!(usage.used.get(&hash).unwrap().region_limit.cpu, 750);
    assert_eq!(store.table_index("quota_usages"), 5);
}

#[test]
fn test_usage_upsert_without_spec_fails() {
    let store = test_store();
    let usage = QuotaUsage::from_spec(&spec("ghost", vec![]));

    let err = store.upsert_quota_usages(3, vec![usage]).unwrap_err();
    assert!(matches!(err, StoreError::UnknownQuotaSpec(name) if name == "ghost"));

    // The failed batch left nothing behind.
    let mut ws = WatchSet::new();
    assert!(store.quota_usage_by_name(&mut ws, "ghost").is_none());
    assert_eq!(store.table_index("quota_usages"), 0);
}

#[test]
fn test_spec_update_with_missing_usage_fails() {
    let store = test_store();
    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    store.upsert_quota_specs(3, vec![s.clone()]).unwrap();
    store
        .delete_quota_usages(4, &["api-team".to_string()])
        .unwrap();

    let err = store.upsert_quota_specs(5, vec![s]).unwrap_err();
    assert!(matches!(err, StoreError::MissingQuotaUsage(name) if name == "api-team"));

    // The aborted batch left the spec at its previous version.
    let mut ws = WatchSet::new();
    let fetched = store.quota_spec_by_name(&mut ws, "api-team").unwrap();
    assert_eq!(fetched.modify_index, 3);
    assert_eq!(store.table_index("quota_specs"), 3);
}

#[test]
fn test_invalid_spec_aborts_whole_batch() {
    let store = test_store();
    let good = spec("api-team", vec![limit("global", 4000, 4096)]);
    let bad = QuotaSpec::new("");

    assert!(store.upsert_quota_specs(3, vec![good, bad]).is_err());

    let mut ws = WatchSet::new();
    assert!(store.quota_spec_by_name(&mut ws, "api-team").is_none());
    assert_eq!(store.table_index("quota_specs"), 0);
}

#[test]
fn test_spec_prefix_lookup_is_lexicographic_and_exact() {
    let store = test_store();
    for (i, name) in ["team-b", "team-a", "teamx", "other"].iter().enumerate() {
        store
            .upsert_quota_specs(
                (i + 1) as u64,
                vec![spec(name, vec![limit("global", 1000, 1024)])],
            )
            .unwrap();
    }

    let mut ws = WatchSet::new();
    let names: Vec<String> = store
        .quota_specs_by_name_prefix(&mut ws, "team-")
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(names, vec!["team-a", "team-b"]);

    let names: Vec<String> = store
        .quota_specs_by_name_prefix(&mut ws, "team")
        .map(|s| s.name.clone())
        .collect();
    assert_eq!(names, vec!["team-a", "team-b", "teamx"]);

    assert_eq!(store.quota_specs(&mut ws).count(), 4);
    assert_eq!(store.quota_usages(&mut ws).count(), 4);
    assert_eq!(
        store
            .quota_usages_by_name_prefix(&mut ws, "team-")
            .count(),
        2
    );
}

#[test]
fn test_ledger_tracks_max_modify_index() {
    let store = test_store();
    seed_cluster(&store);
    store
        .upsert_quota_specs(3, vec![spec("api-team", vec![limit("global", 4000, 4096)])])
        .unwrap();
    store
        .upsert_quota_specs(8, vec![spec("web-team", vec![limit("global", 2000, 2048)])])
        .unwrap();

    let mut ws = WatchSet::new();
    let max_modify = store
        .quota_specs(&mut ws)
        .map(|s| s.modify_index)
        .max()
        .unwrap();
    assert_eq!(store.table_index("quota_specs"), max_modify);

    let ledger: Vec<(String, u64)> = store.table_indexes().collect();
    assert!(ledger.contains(&("quota_specs".to_string(), 8)));
    assert!(ledger.contains(&("namespaces".to_string(), 1)));
    assert!(ledger.contains(&("allocations".to_string(), 2)));
}

#[test]
fn test_collaborator_lookups() {
    let store = test_store();
    seed_cluster(&store);

    let mut ws = WatchSet::new();
    let names: Vec<String> = store
        .namespaces_by_quota(&mut ws, "api-team")
        .map(|n| n.name.clone())
        .collect();
    assert_eq!(names, vec!["batch", "web"]);

    let ids: Vec<String> = store
        .allocs_by_namespace(&mut ws, "web")
        .map(|a| a.id.clone())
        .collect();
    assert_eq!(ids, vec!["a1", "a2"]);

    assert!(store.namespace_by_name(&mut ws, "web").unwrap().quota == Some("api-team".into()));
    assert_eq!(store.alloc_by_id(&mut ws, "a3").unwrap().resources.cpu, 250);
    assert!(store.alloc_by_id(&mut ws, "missing").is_none());
}

#[test]
fn test_namespace_rebind_changes_aggregation() {
    let store = test_store();
    seed_cluster(&store);

    let s = spec("api-team", vec![limit("global", 4000, 4096)]);
    let hash = s.limits[0].hash.clone();
    store.upsert_quota_specs(3, vec![s.clone()]).unwrap();

    // Detach the busier namespace, then force a rebuild through the usage
    // entry point.
    store
        .upsert_namespaces(4, vec![Namespace::new("web")])
        .unwrap();
    store
        .upsert_quota_usages(5, vec![QuotaUsage::from_spec(&s)])
        .unwrap();

    let mut ws = WatchSet::new();
    let usage = store.quota_usage_by_name(&mut ws, "api-team").unwrap();
    let entry = usage.used.get(&hash).unwrap();
    assert_eq!(entry.region_limit.cpu, 250);
    assert_eq!(entry.region_limit.memory_mb, 128);
}
