use tangle_consensus_core::BlockId;
use tangle_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraversalError {
    #[error("block {0} not found while traversing its children")]
    MissingMetadata(BlockId),

    #[error("traversal was aborted")]
    Aborted,

    #[error("critical traversal error: {0}")]
    Critical(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type TraversalResult<T> = std::result::Result<T, TraversalError>;

#[derive(Error, Debug)]
pub enum PruningError {
    #[error("no pruning needed: {0}")]
    NoPruningNeeded(String),

    #[error("not enough history: {0}")]
    NotEnoughHistory(String),

    #[error("database compaction not supported")]
    CompactionNotSupported,

    #[error("database compaction is running")]
    CompactionRunning,

    #[error("pruning was aborted")]
    PruningAborted,

    #[error("critical pruning error: {0}")]
    Critical(String),

    #[error("traversal error: {0}")]
    Traversal(#[from] TraversalError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PruningError {
    /// Whether the error only reports that the request had nothing to do
    pub fn is_benign(&self) -> bool {
        matches!(self, PruningError::NoPruningNeeded(_) | PruningError::NotEnoughHistory(_))
    }
}

pub type PruningResult<T> = std::result::Result<T, PruningError>;
