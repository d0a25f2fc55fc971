use super::milestones::MilestoneKey;
use rocksdb::WriteBatch;
use std::sync::Arc;
use tangle_consensus_core::{MilestoneIndex, milestone::ProtocolParamsOption};
use tangle_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, DB, DirectDbWriter, StoreResult},
    registry::DatabaseStorePrefixes,
};

/// Protocol parameter milestone options keyed by their activation index.
#[derive(Clone)]
pub struct DbProtocolParamsStore {
    db: Arc<DB>,
    access: CachedDbAccess<MilestoneKey, Arc<ProtocolParamsOption>>,
}

impl DbProtocolParamsStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::ProtocolParameters.into()),
        }
    }

    pub fn insert(&self, option: Arc<ProtocolParamsOption>) -> StoreResult<()> {
        self.access.write(DirectDbWriter::new(&self.db), option.target_index.into(), option)
    }

    /// All stored options ordered by activation index
    pub fn options(&self) -> StoreResult<Vec<Arc<ProtocolParamsOption>>> {
        self.access.values(true).collect()
    }

    /// The option in force at `index`, i.e. the one with the highest activation index not above it
    pub fn active_at(&self, index: MilestoneIndex) -> StoreResult<Option<Arc<ProtocolParamsOption>>> {
        Ok(self.options()?.into_iter().rev().find(|option| option.target_index <= index))
    }

    /// Deletes every option which was superseded at `pruning_index`. The option in force at
    /// `pruning_index` and all pending ones are kept. Returns the number of deleted options.
    pub fn prune(&self, pruning_index: MilestoneIndex) -> StoreResult<usize> {
        let options = self.options()?;
        let Some(in_force) = options.iter().rev().find(|option| option.target_index <= pruning_index).map(|option| option.target_index)
        else {
            return Ok(0);
        };

        let mut batch = WriteBatch::default();
        let superseded = options.iter().map(|option| option.target_index).filter(|&index| index < in_force).map(MilestoneKey::from).collect::<Vec<_>>();
        let count = superseded.len();
        self.access.delete_many(BatchDbWriter::new(&mut batch), superseded)?;
        self.db.write(batch)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_database::{create_temp_db, prelude::ConnBuilder};

    fn activation_indexes(store: &DbProtocolParamsStore) -> Vec<MilestoneIndex> {
        store.options().unwrap().iter().map(|option| option.target_index).collect()
    }

    #[test]
    fn test_prune_keeps_option_in_force() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let store = DbProtocolParamsStore::new(db, CachePolicy::Count(8));
        for target_index in [0, 5, 10, 15] {
            store.insert(Arc::new(ProtocolParamsOption { target_index, protocol_version: 2, params: vec![target_index as u8] })).unwrap();
        }
        assert_eq!(store.active_at(6).unwrap().unwrap().target_index, 5);

        assert_eq!(store.prune(6).unwrap(), 1);
        assert_eq!(activation_indexes(&store), vec![5, 10, 15]);

        assert_eq!(store.prune(10).unwrap(), 1);
        assert_eq!(activation_indexes(&store), vec![10, 15]);

        assert_eq!(store.prune(100).unwrap(), 1);
        assert_eq!(activation_indexes(&store), vec![15]);
        assert_eq!(store.prune(100).unwrap(), 0);
    }
}
