use std::{fmt::Display, sync::Arc};
use tangle_consensus_core::{MilestoneIndex, milestone::Milestone};
use tangle_database::{
    prelude::{CachePolicy, CachedDbAccess, DB, DbWriter, DirectDbWriter, StoreError, StoreResult},
    registry::DatabaseStorePrefixes,
};

/// Big-endian milestone index so keys iterate in index order
#[derive(Eq, Hash, PartialEq, Debug, Copy, Clone)]
pub struct MilestoneKey([u8; 4]);

impl AsRef<[u8]> for MilestoneKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<MilestoneIndex> for MilestoneKey {
    fn from(index: MilestoneIndex) -> Self {
        Self(index.to_be_bytes())
    }
}

impl From<MilestoneKey> for MilestoneIndex {
    fn from(key: MilestoneKey) -> Self {
        MilestoneIndex::from_be_bytes(key.0)
    }
}

impl Display for MilestoneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", MilestoneIndex::from(*self))
    }
}

pub trait MilestonesStoreReader {
    fn get(&self, index: MilestoneIndex) -> StoreResult<Arc<Milestone>>;
    fn has(&self, index: MilestoneIndex) -> StoreResult<bool>;

    /// Returns the highest stored milestone index, if any milestone is stored
    fn search_latest_index(&self) -> StoreResult<Option<MilestoneIndex>>;
}

pub trait MilestonesStore: MilestonesStoreReader {
    fn insert(&self, milestone: Arc<Milestone>) -> StoreResult<()>;
    fn delete(&self, writer: impl DbWriter, index: MilestoneIndex) -> StoreResult<()>;
}

/// A DB + cache implementation of the `MilestonesStore` trait, keyed by milestone index.
#[derive(Clone)]
pub struct DbMilestonesStore {
    db: Arc<DB>,
    access: CachedDbAccess<MilestoneKey, Arc<Milestone>>,
}

impl DbMilestonesStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::Milestones.into()) }
    }
}

impl MilestonesStoreReader for DbMilestonesStore {
    fn get(&self, index: MilestoneIndex) -> StoreResult<Arc<Milestone>> {
        self.access.read(index.into())
    }

    fn has(&self, index: MilestoneIndex) -> StoreResult<bool> {
        self.access.has(index.into())
    }

    fn search_latest_index(&self) -> StoreResult<Option<MilestoneIndex>> {
        Ok(self.access.last()?.map(|milestone| milestone.index))
    }
}

impl MilestonesStore for DbMilestonesStore {
    fn insert(&self, milestone: Arc<Milestone>) -> StoreResult<()> {
        let key = MilestoneKey::from(milestone.index);
        if self.access.has(key)? {
            return Err(StoreError::KeyAlreadyExists(key.to_string()));
        }
        self.access.write(DirectDbWriter::new(&self.db), key, milestone)
    }

    fn delete(&self, writer: impl DbWriter, index: MilestoneIndex) -> StoreResult<()> {
        self.access.delete(writer, index.into())
    }
}
