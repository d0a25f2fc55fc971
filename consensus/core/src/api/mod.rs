use crate::MilestoneIndex;

/// Exposes the confirmation state of the node
pub trait SyncStateProvider: Send + Sync {
    fn confirmed_milestone_index(&self) -> MilestoneIndex;

    /// Whether the node has caught up with the latest milestone known to the network
    fn is_node_synced(&self) -> bool;
}

/// Returns the highest milestone index other subsystems currently permit pruning up to
pub type MinTangleHistoryFn = dyn Fn() -> MilestoneIndex + Send + Sync;
