use tangle_consensus_core::errors::config::ConfigError;
use tangle_core::log::LogError;
use tangle_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrunerError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("logger initialization failed: {0}")]
    Log(#[from] LogError),

    #[error("opening database {0} failed: {1}")]
    OpenDatabase(String, rocksdb::Error),

    #[error("{0}")]
    Store(#[from] StoreError),
}

pub type PrunerResult<T> = std::result::Result<T, PrunerError>;
