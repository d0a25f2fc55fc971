use crate::MilestoneIndex;
use serde::{Deserialize, Serialize};

/// Protocol parameters which affect pruning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Blocks whose past cone is older than this many milestones are below max depth
    pub below_max_depth: MilestoneIndex,

    /// Minimal distance between the current entry point index and a new pruning target
    pub additional_pruning_threshold: MilestoneIndex,
}

pub const MAINNET_PARAMS: Params = Params { below_max_depth: 15, additional_pruning_threshold: 5 };

impl Default for Params {
    fn default() -> Self {
        MAINNET_PARAMS
    }
}
