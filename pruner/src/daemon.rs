use crate::{
    args::Args,
    errors::{PrunerError, PrunerResult},
    job::PruneJob,
};
use std::{path::PathBuf, sync::Arc};
use tangle_consensus::{
    consensus::{Consensus, storage::ConsensusStorage},
    model::stores::{milestones::MilestonesStoreReader, utxo::UtxoStoreReader},
    processes::sync::SyncManager,
};
use tangle_consensus_core::{
    MilestoneIndex,
    config::{ConfigBuilder, params::MAINNET_PARAMS},
    errors::config::{ConfigError, ConfigResult},
};
use tangle_core::{core::Core, info};
use tangle_database::prelude::{ConnBuilder, DB, StoreResultExtensions};

const DEFAULT_APP_DIR: &str = ".tangle";
const DEFAULT_DATA_DIR: &str = "datadir";
const TANGLE_DB: &str = "tangle";
const UTXO_DB: &str = "utxo";
const DEFAULT_LOG_DIR: &str = "logs";
const DB_FILES_LIMIT: i32 = 500;

pub fn validate_args(args: &Args) -> ConfigResult<()> {
    if args.logdir.is_some() && args.no_log_files {
        return Err(ConfigError::MixedLogDirAndNoLogFiles);
    }
    args.prune_request()?;
    args.pruning.validate()
}

/// Get the application directory from the supplied [`Args`].
pub fn get_app_dir_from_args(args: &Args) -> PathBuf {
    match args.appdir.as_deref() {
        Some(app_dir) if !app_dir.is_empty() => PathBuf::from(app_dir),
        _ => PathBuf::from(DEFAULT_APP_DIR),
    }
}

/// Get the log directory from the supplied [`Args`]. Logs go under the application directory unless specified.
pub fn get_log_dir(args: &Args) -> Option<String> {
    if args.no_log_files {
        return None;
    }
    let log_dir = match args.logdir.as_deref() {
        Some(log_dir) if !log_dir.is_empty() => PathBuf::from(log_dir),
        _ => get_app_dir_from_args(args).join(DEFAULT_LOG_DIR),
    };
    log_dir.to_str().map(String::from)
}

/// Runtime configuration struct for the application.
#[derive(Default)]
pub struct Runtime {
    log_dir: Option<String>,
}

impl Runtime {
    pub fn from_args(args: &Args) -> PrunerResult<Self> {
        let log_dir = get_log_dir(args);
        tangle_core::log::init_logger(log_dir.as_deref(), &args.log_level)?;
        Ok(Self { log_dir })
    }
}

fn open_db(path: PathBuf) -> PrunerResult<Arc<DB>> {
    ConnBuilder::default()
        .with_db_path(path.clone())
        .with_create_if_missing(false)
        .with_files_limit(DB_FILES_LIMIT)
        .build()
        .map_err(|err| PrunerError::OpenDatabase(path.display().to_string(), err))
}

/// Creates a [`Core`] with the consensus processors and the prune job bound to it. Running the core
/// executes the job once and shuts down.
pub fn create_core(runtime: &Runtime, args: &Args) -> PrunerResult<Arc<Core>> {
    validate_args(args)?;

    let config = Arc::new(
        ConfigBuilder::new(MAINNET_PARAMS).set_pruning(args.pruning.clone()).set_sync_tolerance(args.sync_tolerance).build(),
    );

    let app_dir = get_app_dir_from_args(args);
    let db_dir = app_dir.join(DEFAULT_DATA_DIR);

    info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Application directory: {}", app_dir.display());
    info!("Data directory: {}", db_dir.display());
    match runtime.log_dir.as_ref() {
        Some(s) => info!("Logs directory: {}", s),
        None => info!("Logs to console only"),
    }

    let storage = ConsensusStorage::new(open_db(db_dir.join(TANGLE_DB))?, open_db(db_dir.join(UTXO_DB))?);

    // The ledger index is the confirmed milestone of an offline node
    let confirmed_index = storage.utxo_store.read().ledger_index().optional()?.unwrap_or_default();
    let latest_index = storage.milestones_store.search_latest_index()?.unwrap_or(confirmed_index);
    let sync_manager = Arc::new(SyncManager::new(config.sync_tolerance));
    sync_manager.set_latest_milestone_index(latest_index);
    sync_manager.set_confirmed_milestone_index(confirmed_index);
    info!("Confirmed milestone: {}, latest milestone: {}", confirmed_index, latest_index);

    // No other subsystem holds on to history while the node is offline
    let consensus =
        Arc::new(Consensus::with_storage(config, storage, sync_manager, Arc::new(|| MilestoneIndex::MAX)));
    let job = Arc::new(PruneJob::new(consensus.clone(), args.prune_request()?, confirmed_index));

    let core = Arc::new(Core::new());
    core.bind(consensus);
    core.bind(job);
    Ok(core)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs() {
        let args = Args::parse(["tangle-pruner"]).unwrap();
        assert_eq!(get_app_dir_from_args(&args), PathBuf::from(".tangle"));
        assert_eq!(get_log_dir(&args).as_deref(), Some(".tangle/logs"));

        let args = Args::parse(["tangle-pruner", "--appdir", "/data", "--nologfiles"]).unwrap();
        assert_eq!(get_app_dir_from_args(&args), PathBuf::from("/data"));
        assert_eq!(get_log_dir(&args), None);

        let args = Args::parse(["tangle-pruner", "--logdir", "/logs", "--nologfiles"]).unwrap();
        assert_eq!(validate_args(&args), Err(ConfigError::MixedLogDirAndNoLogFiles));
    }

    #[test]
    fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse(["tangle-pruner", "--nologfiles", "--appdir", dir.path().to_str().unwrap()]).unwrap();
        assert!(matches!(create_core(&Runtime::default(), &args), Err(PrunerError::OpenDatabase(..))));
    }
}
