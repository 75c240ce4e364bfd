use serde::{Deserialize, Serialize};

/// A vector of schedulable resource quantities.
///
/// Used both as a configured ceiling on a quota limit and as the running
/// total of consumption inside a usage record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// CPU in MHz
    pub cpu: u64,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub iops: u64,
}

impl Resources {
    /// Add another resource vector into this one, saturating on overflow.
    pub fn add(&mut self, delta: &Resources) {
        self.cpu = self.cpu.saturating_add(delta.cpu);
        self.memory_mb = self.memory_mb.saturating_add(delta.memory_mb);
        self.disk_mb = self.disk_mb.saturating_add(delta.disk_mb);
        self.iops = self.iops.saturating_add(delta.iops);
    }

    pub fn is_zero(&self) -> bool {
        *self == Resources::default()
    }
}
