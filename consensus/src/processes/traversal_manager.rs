use crate::{
    errors::{TraversalError, TraversalResult},
    model::stores::{
        blocks::{BlocksStoreReader, DbBlocksStore},
        children::{ChildrenStoreReader, DbChildrenStore},
        milestones::{DbMilestonesStore, MilestonesStoreReader},
        snapshot::{DbSnapshotStore, SnapshotStoreReader},
    },
};
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    sync::Arc,
};
use tangle_consensus_core::{
    BlockId, MilestoneIndex,
    block::BlockMetadata,
    snapshot::{SolidEntryPoint, SolidEntryPoints},
};
use tangle_core::debug;
use tangle_database::prelude::StoreResultExtensions;
use tangle_utils::triggers::Listener;

/// Decides whether the walk continues into the parents of a block
pub type TraversalCondition<'a> = dyn FnMut(&BlockMetadata) -> TraversalResult<bool> + 'a;

/// Called once per accepted block, after all of its parents were handled
pub type TraversalConsumer<'a> = dyn FnMut(&BlockMetadata) -> TraversalResult<()> + 'a;

pub type BlockIdHandler<'a> = dyn FnMut(BlockId) -> TraversalResult<()> + 'a;

/// DAG traversal API consumed by pruning
pub trait TraversalService: Send + Sync {
    /// Walks the past cone of `parents` depth first. Each block is visited at most once, its
    /// `condition` is evaluated at most once and `consumer` runs in post order (parents first).
    ///
    /// A block without stored metadata is reported to `on_missing_parent`; without a handler the
    /// traversal fails with [`TraversalError::MissingMetadata`]. Solid entry points are reported to
    /// `on_solid_entry_point` and only walked into if `traverse_solid_entry_points` is set.
    #[allow(clippy::too_many_arguments)]
    fn traverse_parents(
        &self,
        cancel: &Listener,
        parents: &[BlockId],
        condition: &mut TraversalCondition<'_>,
        consumer: &mut TraversalConsumer<'_>,
        on_missing_parent: Option<&mut BlockIdHandler<'_>>,
        on_solid_entry_point: Option<&mut BlockIdHandler<'_>>,
        traverse_solid_entry_points: bool,
    ) -> TraversalResult<()>;

    /// Computes the solid entry points required once every milestone up to `target_index` is pruned.
    /// Entry points are ordered by referencing index and block id.
    fn compute_solid_entry_points(
        &self,
        cancel: &Listener,
        target_index: MilestoneIndex,
        lookback: MilestoneIndex,
    ) -> TraversalResult<Vec<SolidEntryPoint>>;
}

#[derive(Clone)]
pub struct DagTraversalManager<T: BlocksStoreReader, U: ChildrenStoreReader, V: MilestonesStoreReader, W: SnapshotStoreReader> {
    blocks_store: Arc<RwLock<T>>,
    children_store: Arc<RwLock<U>>,
    milestones_store: Arc<V>,
    snapshot_store: Arc<RwLock<W>>,
}

pub type DbTraversalManager = DagTraversalManager<DbBlocksStore, DbChildrenStore, DbMilestonesStore, DbSnapshotStore>;

impl<T: BlocksStoreReader, U: ChildrenStoreReader, V: MilestonesStoreReader, W: SnapshotStoreReader> DagTraversalManager<T, U, V, W> {
    pub fn new(
        blocks_store: Arc<RwLock<T>>,
        children_store: Arc<RwLock<U>>,
        milestones_store: Arc<V>,
        snapshot_store: Arc<RwLock<W>>,
    ) -> Self {
        Self { blocks_store, children_store, milestones_store, snapshot_store }
    }

    /// A block is a solid entry point for `target_index` if any of its direct children, whose
    /// metadata is still stored, was referenced by a milestone above `target_index`
    pub fn is_solid_entry_point(&self, block_id: BlockId, target_index: MilestoneIndex) -> TraversalResult<bool> {
        let children = self.children_store.read().get(block_id)?.read().iter().copied().collect::<Vec<_>>();
        for child in children {
            let metadata = self.blocks_store.read().get_metadata(child).optional()?;
            let Some(metadata) = metadata else {
                continue;
            };
            if metadata.referenced_index.is_some_and(|index| index > target_index) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        cancel: &Listener,
        solid_entry_points: &SolidEntryPoints,
        parents: &[BlockId],
        condition: &mut TraversalCondition<'_>,
        consumer: &mut TraversalConsumer<'_>,
        mut on_missing_parent: Option<&mut BlockIdHandler<'_>>,
        mut on_solid_entry_point: Option<&mut BlockIdHandler<'_>>,
        traverse_solid_entry_points: bool,
    ) -> TraversalResult<()> {
        let mut processed: HashSet<BlockId> = HashSet::new();
        let mut checked: HashMap<BlockId, bool> = HashMap::new();
        let mut stack: Vec<BlockId> = Vec::new();

        for &parent in parents {
            stack.push(parent);

            while let Some(&current) = stack.last() {
                if cancel.is_triggered() {
                    return Err(TraversalError::Aborted);
                }

                if processed.contains(&current) {
                    stack.pop();
                    continue;
                }

                let first_visit = !checked.contains_key(&current);
                if first_visit && solid_entry_points.contains(&current) {
                    if let Some(handler) = on_solid_entry_point.as_mut() {
                        handler(current)?;
                    }
                    if !traverse_solid_entry_points {
                        processed.insert(current);
                        stack.pop();
                        continue;
                    }
                }

                // The store guard must not outlive the lookup, handlers may read the stores again
                let metadata = self.blocks_store.read().get_metadata(current).optional()?;
                let Some(metadata) = metadata else {
                    processed.insert(current);
                    stack.pop();
                    match on_missing_parent.as_mut() {
                        Some(handler) => handler(current)?,
                        None => return Err(TraversalError::MissingMetadata(current)),
                    }
                    continue;
                };

                let accepted = match checked.entry(current) {
                    Entry::Occupied(e) => *e.get(),
                    Entry::Vacant(e) => *e.insert(condition(&metadata)?),
                };
                if !accepted {
                    processed.insert(current);
                    stack.pop();
                    continue;
                }

                // Descend into the first parent which was not handled yet, one at a time
                match metadata.parents.iter().find(|parent| !processed.contains(*parent)) {
                    Some(&next) => stack.push(next),
                    None => {
                        processed.insert(current);
                        stack.pop();
                        consumer(&metadata)?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl<T, U, V, W> TraversalService for DagTraversalManager<T, U, V, W>
where
    T: BlocksStoreReader + Send + Sync,
    U: ChildrenStoreReader + Send + Sync,
    V: MilestonesStoreReader + Send + Sync,
    W: SnapshotStoreReader + Send + Sync,
{
    fn traverse_parents(
        &self,
        cancel: &Listener,
        parents: &[BlockId],
        condition: &mut TraversalCondition<'_>,
        consumer: &mut TraversalConsumer<'_>,
        on_missing_parent: Option<&mut BlockIdHandler<'_>>,
        on_solid_entry_point: Option<&mut BlockIdHandler<'_>>,
        traverse_solid_entry_points: bool,
    ) -> TraversalResult<()> {
        let solid_entry_points = self.snapshot_store.read().solid_entry_points()?;
        self.walk(
            cancel,
            &solid_entry_points,
            parents,
            condition,
            consumer,
            on_missing_parent,
            on_solid_entry_point,
            traverse_solid_entry_points,
        )
    }

    fn compute_solid_entry_points(
        &self,
        cancel: &Listener,
        target_index: MilestoneIndex,
        lookback: MilestoneIndex,
    ) -> TraversalResult<Vec<SolidEntryPoint>> {
        let current_points = self.snapshot_store.read().solid_entry_points()?;
        let mut points: HashMap<BlockId, MilestoneIndex> = HashMap::new();

        for milestone_index in target_index.saturating_sub(lookback)..=target_index {
            if cancel.is_triggered() {
                return Err(TraversalError::Aborted);
            }

            // Milestones of the look-back window may already be pruned. Their anchors are carried over below.
            let Some(milestone) = self.milestones_store.get(milestone_index).optional()? else {
                debug!("solid entry points: milestone ({}) not found, skipping its cone", milestone_index);
                continue;
            };

            let mut condition = |metadata: &BlockMetadata| -> TraversalResult<bool> { Ok(metadata.is_referenced_at_or_after(milestone_index)) };
            let mut consumer = |metadata: &BlockMetadata| -> TraversalResult<()> {
                if cancel.is_triggered() {
                    return Err(TraversalError::Aborted);
                }
                let Some(referenced_index) = metadata.referenced_index else {
                    return Err(TraversalError::Critical(format!("solid entry point candidate {} is not referenced", metadata.block_id)));
                };
                if self.is_solid_entry_point(metadata.block_id, target_index)? {
                    points.entry(metadata.block_id).or_insert(referenced_index);
                }
                Ok(())
            };
            // Blocks below the boundary are anchors already
            let mut on_missing_parent = |_: BlockId| -> TraversalResult<()> { Ok(()) };

            match self.walk(
                cancel,
                &current_points,
                &milestone.parents,
                &mut condition,
                &mut consumer,
                Some(&mut on_missing_parent),
                None,
                true,
            ) {
                Ok(()) => {}
                Err(TraversalError::Aborted) => return Err(TraversalError::Aborted),
                Err(err @ TraversalError::Critical(_)) => return Err(err),
                Err(err) => debug!("solid entry points: traversing the cone of milestone ({}) failed: {}", milestone_index, err),
            }
        }

        // Previous anchors whose payload is gone stay anchors as long as a child above the target needs them
        for point in current_points.iter() {
            if cancel.is_triggered() {
                return Err(TraversalError::Aborted);
            }
            if !points.contains_key(&point.block_id) && self.is_solid_entry_point(point.block_id, target_index)? {
                points.insert(point.block_id, point.index);
            }
        }

        let mut points = points.into_iter().map(|(block_id, index)| SolidEntryPoint::new(block_id, index)).collect::<Vec<_>>();
        points.sort_by_key(|point| (point.index, point.block_id));
        Ok(points)
    }
}
