use crate::model::stores::{
    DB, blocks::DbBlocksStore, children::DbChildrenStore, milestones::DbMilestonesStore, protocol::DbProtocolParamsStore,
    snapshot::DbSnapshotStore, unreferenced::DbUnreferencedBlocksStore, utxo::DbUtxoStore,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tangle_database::prelude::{CachePolicy, StorageInfo};

const BLOCKS_CACHE_SIZE: usize = 2_000;
const METADATA_CACHE_SIZE: usize = 20_000;
const CHILDREN_CACHE_SIZE: usize = 20_000;
const MILESTONES_CACHE_SIZE: usize = 1_000;
const PROTOCOL_PARAMS_CACHE_SIZE: usize = 16;
const UTXO_CACHE_SIZE: usize = 10_000;

pub struct ConsensusStorage {
    // DBs
    tangle_db: Arc<DB>,
    utxo_db: Arc<DB>,

    // Size and compaction state of each DB
    pub tangle_info: Arc<dyn StorageInfo>,
    pub utxo_info: Arc<dyn StorageInfo>,

    // Locked stores. Deleting a block holds the blocks and children write locks, in this order,
    // from staging until the batch is committed.
    pub snapshot_store: Arc<RwLock<DbSnapshotStore>>,
    pub utxo_store: Arc<RwLock<DbUtxoStore>>,
    pub blocks_store: Arc<RwLock<DbBlocksStore>>,
    pub children_store: Arc<RwLock<DbChildrenStore>>,

    // Tangle stores
    pub milestones_store: Arc<DbMilestonesStore>,
    pub unreferenced_blocks_store: Arc<DbUnreferencedBlocksStore>,
    pub protocol_params_store: Arc<DbProtocolParamsStore>,
}

impl ConsensusStorage {
    pub fn new(tangle_db: Arc<DB>, utxo_db: Arc<DB>) -> Arc<Self> {
        let tangle_info: Arc<dyn StorageInfo> = tangle_db.clone();
        let utxo_info: Arc<dyn StorageInfo> = utxo_db.clone();
        Self::with_storage_info(tangle_db, utxo_db, tangle_info, utxo_info)
    }

    /// Builds the storage with externally provided size and compaction queries
    pub fn with_storage_info(
        tangle_db: Arc<DB>,
        utxo_db: Arc<DB>,
        tangle_info: Arc<dyn StorageInfo>,
        utxo_info: Arc<dyn StorageInfo>,
    ) -> Arc<Self> {
        let snapshot_store = Arc::new(RwLock::new(DbSnapshotStore::new(tangle_db.clone())));
        let utxo_store = Arc::new(RwLock::new(DbUtxoStore::new(utxo_db.clone(), CachePolicy::Count(UTXO_CACHE_SIZE))));

        let blocks_store = Arc::new(RwLock::new(DbBlocksStore::new(
            tangle_db.clone(),
            CachePolicy::Count(BLOCKS_CACHE_SIZE),
            CachePolicy::Count(METADATA_CACHE_SIZE),
        )));
        let children_store = Arc::new(RwLock::new(DbChildrenStore::new(tangle_db.clone(), CachePolicy::Count(CHILDREN_CACHE_SIZE))));
        let milestones_store = Arc::new(DbMilestonesStore::new(tangle_db.clone(), CachePolicy::Count(MILESTONES_CACHE_SIZE)));
        let unreferenced_blocks_store = Arc::new(DbUnreferencedBlocksStore::new(tangle_db.clone()));
        let protocol_params_store =
            Arc::new(DbProtocolParamsStore::new(tangle_db.clone(), CachePolicy::Count(PROTOCOL_PARAMS_CACHE_SIZE)));

        Arc::new(Self {
            tangle_db,
            utxo_db,
            tangle_info,
            utxo_info,
            snapshot_store,
            utxo_store,
            blocks_store,
            children_store,
            milestones_store,
            unreferenced_blocks_store,
            protocol_params_store,
        })
    }

    pub fn tangle_db(&self) -> &Arc<DB> {
        &self.tangle_db
    }

    pub fn utxo_db(&self) -> &Arc<DB> {
        &self.utxo_db
    }
}
