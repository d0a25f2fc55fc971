use std::sync::Arc;
use tangle_consensus_core::{
    MilestoneIndex,
    snapshot::{SnapshotInfo, SolidEntryPoints},
};
use tangle_database::{
    prelude::{CachedDbItem, DB, DirectDbWriter, StoreResult, StoreResultExtensions},
    registry::DatabaseStorePrefixes,
};

/// Reader API for `SnapshotStore`.
pub trait SnapshotStoreReader {
    fn snapshot_info(&self) -> StoreResult<SnapshotInfo>;

    /// The stored solid entry points. An empty set is returned if none were stored yet.
    fn solid_entry_points(&self) -> StoreResult<SolidEntryPoints>;
}

pub trait SnapshotStore: SnapshotStoreReader {
    fn set_snapshot_info(&mut self, info: SnapshotInfo) -> StoreResult<()>;
    fn set_entry_point_index(&mut self, index: MilestoneIndex) -> StoreResult<SnapshotInfo>;
    fn set_pruning_index(&mut self, index: MilestoneIndex) -> StoreResult<SnapshotInfo>;
    fn set_solid_entry_points(&mut self, solid_entry_points: &SolidEntryPoints) -> StoreResult<()>;
}

/// A DB + cache implementation of `SnapshotStore` trait, holding the retention boundary and the
/// solid entry points it relies on.
#[derive(Clone)]
pub struct DbSnapshotStore {
    db: Arc<DB>,
    info: CachedDbItem<SnapshotInfo>,
    solid_entry_points: CachedDbItem<SolidEntryPoints>,
}

impl DbSnapshotStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db: Arc::clone(&db),
            info: CachedDbItem::new(db.clone(), DatabaseStorePrefixes::SnapshotInfo.into()),
            solid_entry_points: CachedDbItem::new(db, DatabaseStorePrefixes::SolidEntryPoints.into()),
        }
    }

    pub fn clone_with_new_cache(&self) -> Self {
        Self::new(Arc::clone(&self.db))
    }
}

impl SnapshotStoreReader for DbSnapshotStore {
    fn snapshot_info(&self) -> StoreResult<SnapshotInfo> {
        self.info.read()
    }

    fn solid_entry_points(&self) -> StoreResult<SolidEntryPoints> {
        Ok(self.solid_entry_points.read().optional()?.unwrap_or_default())
    }
}

impl SnapshotStore for DbSnapshotStore {
    fn set_snapshot_info(&mut self, info: SnapshotInfo) -> StoreResult<()> {
        self.info.write(DirectDbWriter::new(&self.db), &info)
    }

    fn set_entry_point_index(&mut self, index: MilestoneIndex) -> StoreResult<SnapshotInfo> {
        self.info.update(DirectDbWriter::new(&self.db), |info| SnapshotInfo { entry_point_index: index, ..info })
    }

    fn set_pruning_index(&mut self, index: MilestoneIndex) -> StoreResult<SnapshotInfo> {
        self.info.update(DirectDbWriter::new(&self.db), |info| SnapshotInfo { pruning_index: index, ..info })
    }

    fn set_solid_entry_points(&mut self, solid_entry_points: &SolidEntryPoints) -> StoreResult<()> {
        self.solid_entry_points.write(DirectDbWriter::new(&self.db), solid_entry_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_consensus_core::snapshot::SolidEntryPoint;
    use tangle_database::{create_temp_db, prelude::ConnBuilder};

    #[test]
    fn test_boundary_updates() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let mut store = DbSnapshotStore::new(db);
        assert!(store.snapshot_info().optional().unwrap().is_none());
        assert!(store.solid_entry_points().unwrap().is_empty());
        assert!(store.set_pruning_index(3).is_err());

        store.set_snapshot_info(SnapshotInfo::new(100, 42)).unwrap();
        store.set_entry_point_index(120).unwrap();
        let info = store.set_pruning_index(110).unwrap();
        assert_eq!(info, SnapshotInfo { snapshot_index: 100, entry_point_index: 120, pruning_index: 110, timestamp: 42 });

        let points = [SolidEntryPoint::new(1.into(), 100)].into_iter().collect();
        store.set_solid_entry_points(&points).unwrap();

        let store = store.clone_with_new_cache();
        assert_eq!(store.snapshot_info().unwrap(), info);
        assert_eq!(store.solid_entry_points().unwrap(), points);
    }
}
