use crate::{
    MilestoneIndex,
    errors::config::{ConfigError, ConfigResult},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tangle_utils::bytes::ByteSize;

pub const DEFAULT_MAX_MILESTONES_TO_KEEP: MilestoneIndex = 60480;
pub const DEFAULT_TARGET_SIZE: ByteSize = ByteSize(30_000_000_000);
pub const DEFAULT_THRESHOLD_PERCENTAGE: f64 = 10.0;
pub const DEFAULT_COOLDOWN_TIME: Duration = Duration::from_secs(5 * 60);

/// Count based retention
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MilestonesPruningConfig {
    pub enabled: bool,
    /// The number of most recent milestones kept in the database
    pub max_milestones_to_keep: MilestoneIndex,
}

impl Default for MilestonesPruningConfig {
    fn default() -> Self {
        Self { enabled: false, max_milestones_to_keep: DEFAULT_MAX_MILESTONES_TO_KEEP }
    }
}

/// Database size based retention
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SizePruningConfig {
    pub enabled: bool,
    /// The combined size of the tangle and UTXO databases to stay below
    pub target_size: ByteSize,
    /// Percentage of the target size to free in addition, so pruning does not re-trigger right away
    pub threshold_percentage: f64,
    /// Minimum time between two size based pruning runs
    #[serde(with = "duration_serde")]
    pub cooldown_time: Duration,
}

impl Default for SizePruningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_size: DEFAULT_TARGET_SIZE,
            threshold_percentage: DEFAULT_THRESHOLD_PERCENTAGE,
            cooldown_time: DEFAULT_COOLDOWN_TIME,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PruningConfig {
    pub milestones: MilestonesPruningConfig,
    pub size: SizePruningConfig,
    /// Also delete the receipts of pruned milestones
    pub prune_receipts: bool,
    /// Look-back used when recomputing solid entry points. Defaults to the `below_max_depth` protocol parameter.
    pub solid_entry_point_check_threshold_past: Option<MilestoneIndex>,
}

impl PruningConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.milestones.enabled && self.milestones.max_milestones_to_keep == 0 {
            return Err(ConfigError::ZeroMilestonesToKeep);
        }
        if self.size.enabled && self.size.target_size.0 == 0 {
            return Err(ConfigError::ZeroTargetSize);
        }
        let threshold = self.size.threshold_percentage;
        if !(0.0..100.0).contains(&threshold) {
            return Err(ConfigError::ThresholdOutOfRange(threshold));
        }
        if let Some(lookback) = self.solid_entry_point_check_threshold_past {
            if self.milestones.enabled && self.milestones.max_milestones_to_keep <= lookback {
                return Err(ConfigError::MilestonesToKeepBelowLookback(self.milestones.max_milestones_to_keep, lookback));
            }
        }
        Ok(())
    }
}

mod duration_serde {
    use duration_string::DurationString;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&DurationString::from(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        let duration: DurationString = value.parse().map_err(D::Error::custom)?;
        Ok(duration.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PruningConfig::default();
        assert!(!config.milestones.enabled);
        assert_eq!(config.milestones.max_milestones_to_keep, 60480);
        assert!(config.size.enabled);
        assert_eq!(config.size.target_size, ByteSize(30_000_000_000));
        assert_eq!(config.size.threshold_percentage, 10.0);
        assert_eq!(config.size.cooldown_time, Duration::from_secs(300));
        assert!(!config.prune_receipts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml() {
        let config: PruningConfig = toml::from_str(
            r#"
            prune-receipts = true
            [milestones]
            enabled = true
            max-milestones-to-keep = 1000
            [size]
            target-size = "512MiB"
            cooldown-time = "90s"
            "#,
        )
        .unwrap();
        assert!(config.prune_receipts);
        assert_eq!(config.milestones.max_milestones_to_keep, 1000);
        assert_eq!(config.size.target_size, ByteSize(512 * 1024 * 1024));
        assert_eq!(config.size.cooldown_time, Duration::from_secs(90));
        assert_eq!(config.size.threshold_percentage, DEFAULT_THRESHOLD_PERCENTAGE);

        assert!(toml::from_str::<PruningConfig>("unknown-field = 1").is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = PruningConfig::default();
        config.milestones.enabled = true;
        config.milestones.max_milestones_to_keep = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMilestonesToKeep));

        let mut config = PruningConfig::default();
        config.size.target_size = ByteSize(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTargetSize));
        config.size.enabled = false;
        assert!(config.validate().is_ok());

        let mut config = PruningConfig::default();
        config.size.threshold_percentage = 100.0;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(100.0)));

        let mut config = PruningConfig::default();
        config.milestones.enabled = true;
        config.milestones.max_milestones_to_keep = 10;
        config.solid_entry_point_check_threshold_past = Some(10);
        assert_eq!(config.validate(), Err(ConfigError::MilestonesToKeepBelowLookback(10, 10)));
    }
}
