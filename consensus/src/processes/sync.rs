use std::sync::atomic::{AtomicU32, Ordering};
use tangle_consensus_core::{MilestoneIndex, api::SyncStateProvider};

/// Tracks the confirmed and latest known milestone indexes of the node
#[derive(Debug, Default)]
pub struct SyncManager {
    confirmed_milestone_index: AtomicU32,
    latest_milestone_index: AtomicU32,
    /// Number of milestones the confirmed index may lag behind and still count as synced
    tolerance: MilestoneIndex,
}

impl SyncManager {
    pub fn new(tolerance: MilestoneIndex) -> Self {
        Self { tolerance, ..Default::default() }
    }

    pub fn set_confirmed_milestone_index(&self, index: MilestoneIndex) {
        self.confirmed_milestone_index.store(index, Ordering::Release);
        self.latest_milestone_index.fetch_max(index, Ordering::AcqRel);
    }

    /// Records a newly seen milestone index. The latest index never decreases.
    pub fn set_latest_milestone_index(&self, index: MilestoneIndex) {
        self.latest_milestone_index.fetch_max(index, Ordering::AcqRel);
    }

    pub fn latest_milestone_index(&self) -> MilestoneIndex {
        self.latest_milestone_index.load(Ordering::Acquire)
    }
}

impl SyncStateProvider for SyncManager {
    fn confirmed_milestone_index(&self) -> MilestoneIndex {
        self.confirmed_milestone_index.load(Ordering::Acquire)
    }

    fn is_node_synced(&self) -> bool {
        let latest = self.latest_milestone_index();
        latest != 0 && self.confirmed_milestone_index().saturating_add(self.tolerance) >= latest
    }
}
