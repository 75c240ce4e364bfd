/// Configuration for a state store instance.
///
/// The region identifies which cluster region this store represents. Quota
/// limits scoped to other regions are stored but never aggregated locally,
/// so that each region only counts its own allocations.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub region: String,
}

impl StoreConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("global")
    }
}
