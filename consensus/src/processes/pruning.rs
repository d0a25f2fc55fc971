use crate::errors::{PruningError, PruningResult};
use tangle_consensus_core::{MilestoneIndex, snapshot::SnapshotInfo};

/// Computes pruning targets and validates them against the current retention boundary.
#[derive(Clone, Debug)]
pub struct PruningManager {
    additional_pruning_threshold: MilestoneIndex,
    size_threshold_percentage: f64,
}

impl PruningManager {
    pub fn new(additional_pruning_threshold: MilestoneIndex, size_threshold_percentage: f64) -> Self {
        Self { additional_pruning_threshold, size_threshold_percentage }
    }

    pub fn target_index_by_depth(&self, confirmed_index: MilestoneIndex, depth: MilestoneIndex) -> PruningResult<MilestoneIndex> {
        if confirmed_index <= depth {
            return Err(PruningError::NotEnoughHistory(format!("confirmed index: {}, pruning depth: {}", confirmed_index, depth)));
        }
        Ok(confirmed_index - depth)
    }

    /// Picks a target index which brings the database back below `target_size` (minus the configured
    /// threshold), assuming its size is evenly spread over the retained milestones.
    pub fn target_index_by_size(
        &self,
        confirmed_index: MilestoneIndex,
        pruning_index: MilestoneIndex,
        current_size: u64,
        target_size: u64,
    ) -> PruningResult<MilestoneIndex> {
        if target_size == 0 {
            return Err(PruningError::NoPruningNeeded("size based pruning is deactivated".to_string()));
        }
        if current_size < target_size {
            return Err(PruningError::NoPruningNeeded(format!("database size: {}, target size: {}", current_size, target_size)));
        }

        let milestone_range = confirmed_index.saturating_sub(pruning_index);
        let pruned_size = target_size as f64 * ((100.0 - self.size_threshold_percentage) / 100.0);
        let diff_percentage = pruned_size / current_size as f64;
        let milestone_diff = (milestone_range as f64 * diff_percentage).ceil() as MilestoneIndex;

        Ok(confirmed_index - milestone_diff.min(confirmed_index))
    }

    /// Rejects targets which are already pruned or too close to the current solid entry points
    pub fn validate_target(&self, snapshot_info: &SnapshotInfo, target_index: MilestoneIndex) -> PruningResult<()> {
        if snapshot_info.pruning_index >= target_index {
            return Err(PruningError::NoPruningNeeded(format!(
                "pruning index: {}, target index: {}",
                snapshot_info.pruning_index, target_index
            )));
        }

        // Pruning advances in steps of at least `additional_pruning_threshold` so entry points get recomputed
        let minimum_index = snapshot_info.entry_point_index + self.additional_pruning_threshold + 1;
        if minimum_index > target_index {
            return Err(PruningError::NotEnoughHistory(format!("minimum index: {}, target index: {}", minimum_index, target_index)));
        }
        Ok(())
    }
}
