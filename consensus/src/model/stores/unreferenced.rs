use super::milestones::MilestoneKey;
use rocksdb::WriteBatch;
use std::sync::Arc;
use tangle_consensus_core::{BlockId, MilestoneIndex};
use tangle_database::{
    prelude::{BatchDbWriter, DB, DbSetAccess, DirectDbWriter, StoreResult},
    registry::DatabaseStorePrefixes,
};

/// Blocks which were not referenced by a milestone yet, bucketed by the confirmed milestone index
/// at the time they were received. A bucket is removed once its milestone index gets pruned.
#[derive(Clone)]
pub struct DbUnreferencedBlocksStore {
    db: Arc<DB>,
    access: DbSetAccess<MilestoneKey, BlockId>,
}

impl DbUnreferencedBlocksStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db: Arc::clone(&db), access: DbSetAccess::new(db, DatabaseStorePrefixes::UnreferencedBlocks.into()) }
    }

    pub fn get(&self, index: MilestoneIndex) -> StoreResult<Vec<BlockId>> {
        self.access.bucket_iterator(index.into()).collect()
    }

    pub fn insert(&self, index: MilestoneIndex, block_id: BlockId) -> StoreResult<()> {
        self.access.write(DirectDbWriter::new(&self.db), index.into(), block_id)
    }

    pub fn insert_batch(&self, batch: &mut WriteBatch, index: MilestoneIndex, block_id: BlockId) -> StoreResult<()> {
        self.access.write(BatchDbWriter::new(batch), index.into(), block_id)
    }

    pub fn delete(&self, index: MilestoneIndex) -> StoreResult<()> {
        self.access.delete_bucket(DirectDbWriter::new(&self.db), index.into())
    }
}
