use crate::{BlockId, MilestoneIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, hash_map::Entry};

/// The persisted retention boundary of the node database
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// The index of the snapshot the database was bootstrapped from
    pub snapshot_index: MilestoneIndex,
    /// The index for which the stored solid entry points are valid
    pub entry_point_index: MilestoneIndex,
    /// All milestone scoped data at or below this index was deleted
    pub pruning_index: MilestoneIndex,
    pub timestamp: u64,
}

impl SnapshotInfo {
    pub fn new(snapshot_index: MilestoneIndex, timestamp: u64) -> Self {
        Self { snapshot_index, entry_point_index: snapshot_index, pruning_index: snapshot_index, timestamp }
    }
}

/// A block below the pruning boundary which is kept as an anchor for traversals
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolidEntryPoint {
    pub block_id: BlockId,
    /// The index of the milestone which referenced the block
    pub index: MilestoneIndex,
}

impl SolidEntryPoint {
    pub fn new(block_id: BlockId, index: MilestoneIndex) -> Self {
        Self { block_id, index }
    }
}

/// The set of solid entry points keyed by block id
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidEntryPoints {
    points: HashMap<BlockId, MilestoneIndex>,
}

impl SolidEntryPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, block_id: &BlockId) -> bool {
        self.points.contains_key(block_id)
    }

    pub fn index(&self, block_id: &BlockId) -> Option<MilestoneIndex> {
        self.points.get(block_id).copied()
    }

    /// Adds the entry point. An existing entry keeps the higher referencing index.
    pub fn add(&mut self, point: SolidEntryPoint) {
        match self.points.entry(point.block_id) {
            Entry::Occupied(mut e) => {
                if point.index > *e.get() {
                    e.insert(point.index);
                }
            }
            Entry::Vacant(e) => {
                e.insert(point.index);
            }
        }
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = SolidEntryPoint>) {
        points.into_iter().for_each(|point| self.add(point));
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SolidEntryPoint> + '_ {
        self.points.iter().map(|(block_id, index)| SolidEntryPoint::new(*block_id, *index))
    }

    /// Entry points ordered by index and block id
    pub fn sorted(&self) -> Vec<SolidEntryPoint> {
        let mut points = self.iter().collect::<Vec<_>>();
        points.sort_by_key(|point| (point.index, point.block_id));
        points
    }
}

impl FromIterator<SolidEntryPoint> for SolidEntryPoints {
    fn from_iter<T: IntoIterator<Item = SolidEntryPoint>>(iter: T) -> Self {
        let mut points = Self::new();
        points.extend(iter);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_highest_index() {
        let mut points = SolidEntryPoints::new();
        points.add(SolidEntryPoint::new(1.into(), 10));
        points.add(SolidEntryPoint::new(1.into(), 8));
        assert_eq!(points.index(&1.into()), Some(10));
        points.add(SolidEntryPoint::new(1.into(), 12));
        assert_eq!(points.index(&1.into()), Some(12));
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_sorted_and_serde() {
        let points: SolidEntryPoints =
            [SolidEntryPoint::new(3.into(), 7), SolidEntryPoint::new(2.into(), 7), SolidEntryPoint::new(9.into(), 5)].into_iter().collect();
        let sorted = points.sorted();
        assert_eq!(sorted.iter().map(|p| p.index).collect::<Vec<_>>(), vec![5, 7, 7]);
        assert_eq!(sorted[1].block_id, 2.into());

        let bytes = bincode::serialize(&points).unwrap();
        assert_eq!(bincode::deserialize::<SolidEntryPoints>(&bytes).unwrap(), points);
    }
}
