use rocksdb::WriteBatch;
use std::{collections::HashSet, sync::Arc};
use tangle_consensus_core::BlockId;
use tangle_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbSetAccess, DB, DbWriter, DirectDbWriter, ReadLock, StoreError, StoreResult},
    registry::DatabaseStorePrefixes,
};

pub trait ChildrenStoreReader {
    fn get(&self, parent: BlockId) -> StoreResult<ReadLock<HashSet<BlockId>>>;
}

pub trait ChildrenStore {
    fn insert_child(&self, writer: impl DbWriter, parent: BlockId, child: BlockId) -> Result<(), StoreError>;
    fn delete_child(&self, writer: impl DbWriter, parent: BlockId, child: BlockId) -> Result<(), StoreError>;
}

/// A DB + cache implementation of the parent to children edge store, with concurrency support.
#[derive(Clone)]
pub struct DbChildrenStore {
    db: Arc<DB>,
    access: CachedDbSetAccess<BlockId, BlockId>,
}

impl DbChildrenStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbSetAccess::new(db, cache_policy, DatabaseStorePrefixes::Children.into()) }
    }

    pub fn insert_batch(&self, batch: &mut WriteBatch, parent: BlockId, child: BlockId) -> Result<(), StoreError> {
        self.access.write(BatchDbWriter::new(batch), parent, child)?;
        Ok(())
    }

    /// Removes the `parent -> child` edge as part of the given batch
    pub fn delete_batch(&self, batch: &mut WriteBatch, parent: BlockId, child: BlockId) -> Result<(), StoreError> {
        self.delete_child(BatchDbWriter::new(batch), parent, child)
    }

    pub fn insert(&self, parent: BlockId, child: BlockId) -> StoreResult<()> {
        self.insert_child(DirectDbWriter::new(&self.db), parent, child)
    }
}

impl ChildrenStoreReader for DbChildrenStore {
    fn get(&self, parent: BlockId) -> StoreResult<ReadLock<HashSet<BlockId>>> {
        self.access.read(parent)
    }
}

impl ChildrenStore for DbChildrenStore {
    fn insert_child(&self, writer: impl DbWriter, parent: BlockId, child: BlockId) -> Result<(), StoreError> {
        self.access.write(writer, parent, child)?;
        Ok(())
    }

    fn delete_child(&self, writer: impl DbWriter, parent: BlockId, child: BlockId) -> Result<(), StoreError> {
        self.access.delete(writer, parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_database::{create_temp_db, prelude::ConnBuilder};

    #[test]
    fn test_children_edges() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let store = DbChildrenStore::new(db.clone(), CachePolicy::Count(8));

        store.insert(1.into(), 2.into()).unwrap();
        store.insert(1.into(), 3.into()).unwrap();
        store.insert(2.into(), 3.into()).unwrap();
        assert_eq!(store.get(1.into()).unwrap().read().len(), 2);

        let mut batch = WriteBatch::default();
        store.delete_batch(&mut batch, 1.into(), 3.into()).unwrap();
        db.write(batch).unwrap();

        let children = store.get(1.into()).unwrap().read().clone();
        assert_eq!(children, HashSet::from([2.into()]));
        assert!(store.get(3.into()).unwrap().read().is_empty());
    }
}
