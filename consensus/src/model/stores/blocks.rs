use rocksdb::WriteBatch;
use std::sync::Arc;
use tangle_consensus_core::{
    BlockId,
    block::{Block, BlockMetadata},
};
use tangle_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, DB, DirectDbWriter, StoreError, StoreResult},
    registry::DatabaseStorePrefixes,
};

pub trait BlocksStoreReader {
    fn get_block(&self, block_id: BlockId) -> StoreResult<Arc<Block>>;
    fn get_metadata(&self, block_id: BlockId) -> StoreResult<BlockMetadata>;

    /// Whether metadata of the block is stored. Blocks are only traversable through their metadata.
    fn has(&self, block_id: BlockId) -> StoreResult<bool>;
}

pub trait BlocksStore: BlocksStoreReader {
    fn insert(&self, block: Arc<Block>, metadata: BlockMetadata) -> StoreResult<()>;
    fn set_metadata(&self, metadata: BlockMetadata) -> StoreResult<()>;
    fn delete(&self, block_id: BlockId) -> StoreResult<()>;
}

/// A DB + cache implementation of the `BlocksStore` trait, holding block payloads and their metadata.
#[derive(Clone)]
pub struct DbBlocksStore {
    db: Arc<DB>,
    blocks_access: CachedDbAccess<BlockId, Arc<Block>>,
    metadata_access: CachedDbAccess<BlockId, BlockMetadata>,
}

impl DbBlocksStore {
    pub fn new(db: Arc<DB>, blocks_cache_policy: CachePolicy, metadata_cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            blocks_access: CachedDbAccess::new(db.clone(), blocks_cache_policy, DatabaseStorePrefixes::Blocks.into()),
            metadata_access: CachedDbAccess::new(db, metadata_cache_policy, DatabaseStorePrefixes::BlockMetadata.into()),
        }
    }

    pub fn clone_with_new_cache(&self, blocks_cache_policy: CachePolicy, metadata_cache_policy: CachePolicy) -> Self {
        Self::new(Arc::clone(&self.db), blocks_cache_policy, metadata_cache_policy)
    }

    pub fn insert_batch(&self, batch: &mut WriteBatch, block: Arc<Block>, metadata: BlockMetadata) -> StoreResult<()> {
        if self.metadata_access.has(block.id)? {
            return Err(StoreError::KeyAlreadyExists(block.id.to_string()));
        }
        let block_id = block.id;
        self.blocks_access.write(BatchDbWriter::new(batch), block_id, block)?;
        self.metadata_access.write(BatchDbWriter::new(batch), block_id, metadata)?;
        Ok(())
    }

    pub fn set_metadata_batch(&self, batch: &mut WriteBatch, metadata: BlockMetadata) -> StoreResult<()> {
        self.metadata_access.write(BatchDbWriter::new(batch), metadata.block_id, metadata)
    }

    /// Deletes the payload and the metadata of the block
    pub fn delete_batch(&self, batch: &mut WriteBatch, block_id: BlockId) -> StoreResult<()> {
        self.blocks_access.delete(BatchDbWriter::new(batch), block_id)?;
        self.metadata_access.delete(BatchDbWriter::new(batch), block_id)
    }
}

impl BlocksStoreReader for DbBlocksStore {
    fn get_block(&self, block_id: BlockId) -> StoreResult<Arc<Block>> {
        self.blocks_access.read(block_id)
    }

    fn get_metadata(&self, block_id: BlockId) -> StoreResult<BlockMetadata> {
        self.metadata_access.read(block_id)
    }

    fn has(&self, block_id: BlockId) -> StoreResult<bool> {
        self.metadata_access.has(block_id)
    }
}

impl BlocksStore for DbBlocksStore {
    fn insert(&self, block: Arc<Block>, metadata: BlockMetadata) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        self.insert_batch(&mut batch, block, metadata)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn set_metadata(&self, metadata: BlockMetadata) -> StoreResult<()> {
        self.metadata_access.write(DirectDbWriter::new(&self.db), metadata.block_id, metadata)
    }

    fn delete(&self, block_id: BlockId) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        self.delete_batch(&mut batch, block_id)?;
        self.db.write(batch)?;
        Ok(())
    }
}
