use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Configuration: milestone based pruning is enabled but max-milestones-to-keep is zero")]
    ZeroMilestonesToKeep,

    #[error("Configuration: size based pruning is enabled but target-size is zero")]
    ZeroTargetSize,

    #[error("Configuration: threshold-percentage {0} is outside of [0, 100)")]
    ThresholdOutOfRange(f64),

    #[error("Configuration: max-milestones-to-keep {0} must exceed the solid entry point look-back {1}")]
    MilestonesToKeepBelowLookback(u32, u32),

    #[error("Configuration: --logdir and --nologfiles cannot be used together")]
    MixedLogDirAndNoLogFiles,

    #[error("Configuration: only one of --index, --depth and --target-size may be given")]
    MultiplePruneRequests,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
