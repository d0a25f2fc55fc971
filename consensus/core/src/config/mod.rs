pub mod params;
pub mod pruning;

use crate::MilestoneIndex;
use std::ops::Deref;
use {params::Params, pruning::PruningConfig};

/// Configuration of the pruning subsystem bundled with the protocol parameters it depends on.
/// Use `Config::new` for building from a `Params` instance and `ConfigBuilder` for anything more
/// complex. NOTE: this struct can be implicitly de-refed into `Params`
#[derive(Clone, Debug)]
pub struct Config {
    /// Protocol params
    pub params: Params,

    pub pruning: PruningConfig,

    /// Number of milestones the node may lag behind the latest known milestone and still count as synced
    pub sync_tolerance: MilestoneIndex,
}

impl Config {
    pub fn new(params: Params) -> Self {
        Self { params, pruning: Default::default(), sync_tolerance: 0 }
    }

    pub fn to_builder(&self) -> ConfigBuilder {
        ConfigBuilder { config: self.clone() }
    }

    /// The milestone look-back used when recomputing solid entry points
    pub fn solid_entry_point_lookback(&self) -> MilestoneIndex {
        self.pruning.solid_entry_point_check_threshold_past.unwrap_or(self.params.below_max_depth)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl AsRef<Params> for Config {
    fn as_ref(&self) -> &Params {
        &self.params
    }
}

impl Deref for Config {
    type Target = Params;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(params: Params) -> Self {
        Self { config: Config::new(params) }
    }

    pub fn set_pruning(mut self, pruning: PruningConfig) -> Self {
        self.config.pruning = pruning;
        self
    }

    pub fn edit_pruning<F>(mut self, edit_func: F) -> Self
    where
        F: Fn(&mut PruningConfig),
    {
        edit_func(&mut self.config.pruning);
        self
    }

    pub fn edit_params<F>(mut self, edit_func: F) -> Self
    where
        F: Fn(&mut Params),
    {
        edit_func(&mut self.config.params);
        self
    }

    pub fn set_sync_tolerance(mut self, sync_tolerance: MilestoneIndex) -> Self {
        self.config.sync_tolerance = sync_tolerance;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
