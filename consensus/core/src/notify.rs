use crate::MilestoneIndex;
use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

/// Per phase durations of pruning a single milestone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruningMetrics {
    pub milestone_index: MilestoneIndex,
    pub blocks_pruned: usize,
    pub duration_prune_unreferenced_blocks: Duration,
    pub duration_traverse_milestone_cone: Duration,
    pub duration_prune_milestone: Duration,
    pub duration_prune_blocks: Duration,
    pub duration_set_snapshot_info: Duration,
    pub duration_pruning_milestone_index_changed: Duration,
    pub duration_total: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PruningNotification {
    /// The pruning status flag changed, `true` while a prune runs
    StatusChanged(bool),
    /// The pruning index advanced to the given milestone
    IndexChanged(MilestoneIndex),
    MetricsUpdated(PruningMetrics),
}

impl Display for PruningNotification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PruningNotification::StatusChanged(running) => write!(f, "pruning status changed (running: {running})"),
            PruningNotification::IndexChanged(index) => write!(f, "pruning index changed to {index}"),
            PruningNotification::MetricsUpdated(metrics) => {
                write!(f, "pruning metrics of milestone {} ({:?})", metrics.milestone_index, metrics.duration_total)
            }
        }
    }
}
