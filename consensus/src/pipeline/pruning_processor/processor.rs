//! The pruning processor deletes milestone cones below a target index while keeping the database
//! traversable. All prunes are serialized by the operation lock, which snapshot operations share.
//! The boundary is moved in this order:
//!
//! 1. the new solid entry points are added to the stored ones and `entry_point_index` is set,
//! 2. milestones are pruned one by one in increasing order, each advancing `pruning_index`,
//! 3. the stored solid entry points are replaced by the new ones.
//!
//! Interrupting the sequence at any point leaves the cones of all milestones above the entry point
//! index traversable down to a solid entry point.

use crate::{
    consensus::storage::ConsensusStorage,
    errors::{PruningError, PruningResult, TraversalError, TraversalResult},
    model::stores::{
        blocks::BlocksStoreReader,
        milestones::{MilestonesStore, MilestonesStoreReader},
        snapshot::{SnapshotStore, SnapshotStoreReader},
    },
    pipeline::pruning_processor::notifier::PruningNotifier,
    processes::{pruning::PruningManager, traversal_manager::TraversalService},
};
use crossbeam_channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender};
use parking_lot::{Mutex, RwLock};
use rocksdb::WriteBatch;
use std::{
    fmt::Display,
    sync::Arc,
    time::{Duration, Instant},
};
use tangle_consensus_core::{
    BlockId, MilestoneIndex,
    api::{MinTangleHistoryFn, SyncStateProvider},
    block::BlockMetadata,
    config::Config,
    notify::{PruningMetrics, PruningNotification},
    snapshot::{SnapshotInfo, SolidEntryPoints},
};
use tangle_core::{debug, error, info, warn};
use tangle_database::prelude::{DirectDbWriter, StoreResult, StoreResultExtensions};
use tangle_utils::triggers::Listener;

/// A prune request as received from an API or the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PruneRequest {
    /// Prune up to and including the given milestone index
    TargetIndex(MilestoneIndex),
    /// Keep the given number of milestones below the confirmed milestone
    Depth(MilestoneIndex),
    /// Prune until the database fits the given size, or the configured target size if `None`
    TargetSize(Option<u64>),
}

pub enum PruningProcessingMessage {
    Exit,
    ConfirmedMilestone(MilestoneIndex),
    Request { request: PruneRequest, response: CrossbeamSender<PruningResult<MilestoneIndex>> },
    /// Answered once every message queued before it was handled
    Flush(CrossbeamSender<()>),
}

#[derive(Default)]
struct PruningStatus {
    is_pruning: bool,
    last_size_pruning: Option<Instant>,
}

/// Resets the pruning status when a prune returns, whichever way it returns
struct PruningStatusGuard<'a> {
    processor: &'a PruningProcessor,
}

impl Drop for PruningStatusGuard<'_> {
    fn drop(&mut self) {
        self.processor.set_is_pruning(false);
    }
}

fn fatal(context: &str, err: impl Display) -> ! {
    error!("{}: {}", context, err);
    panic!("{}: {}", context, err)
}

/// A processor dedicated to deleting old milestones and their cones from the database
pub struct PruningProcessor {
    // Channels
    receiver: CrossbeamReceiver<PruningProcessingMessage>,

    // Config
    config: Arc<Config>,

    // Stores
    storage: Arc<ConsensusStorage>,

    // Managers and services
    traversal_service: Arc<dyn TraversalService>,
    sync_state: Arc<dyn SyncStateProvider>,
    min_tangle_history: Arc<MinTangleHistoryFn>,
    pruning_manager: PruningManager,
    notifier: Arc<PruningNotifier>,

    // Locks and state
    operation_lock: Arc<Mutex<()>>,
    status: RwLock<PruningStatus>,
    cancel: Listener,
}

impl PruningProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: CrossbeamReceiver<PruningProcessingMessage>,
        config: Arc<Config>,
        storage: Arc<ConsensusStorage>,
        traversal_service: Arc<dyn TraversalService>,
        sync_state: Arc<dyn SyncStateProvider>,
        min_tangle_history: Arc<MinTangleHistoryFn>,
        notifier: Arc<PruningNotifier>,
        cancel: Listener,
    ) -> Self {
        let pruning_manager = PruningManager::new(config.additional_pruning_threshold, config.pruning.size.threshold_percentage);
        Self {
            receiver,
            config,
            storage,
            traversal_service,
            sync_state,
            min_tangle_history,
            pruning_manager,
            notifier,
            operation_lock: Default::default(),
            status: Default::default(),
            cancel,
        }
    }

    pub fn worker(self: &Arc<Self>) {
        let cancel = self.cancel.clone();
        while let Ok(msg) = self.receiver.recv() {
            match msg {
                PruningProcessingMessage::Exit => break,
                PruningProcessingMessage::ConfirmedMilestone(confirmed_index) => self.on_confirmed_milestone(&cancel, confirmed_index),
                PruningProcessingMessage::Request { request, response } => {
                    let result = self.process_request(&cancel, request);
                    // The requester may have stopped waiting
                    let _ = response.send(result);
                }
                PruningProcessingMessage::Flush(done) => {
                    let _ = done.send(());
                }
            };
        }

        // Pending requests observe a disconnected response channel
        self.receiver.try_iter().for_each(drop);
    }

    /// The lock serializing prunes. Snapshot operations hold it to keep the boundary stable.
    pub fn operation_lock(&self) -> Arc<Mutex<()>> {
        self.operation_lock.clone()
    }

    pub fn notifier(&self) -> Arc<PruningNotifier> {
        self.notifier.clone()
    }

    pub fn is_pruning(&self) -> bool {
        self.status.read().is_pruning
    }

    pub fn process_request(&self, cancel: &Listener, request: PruneRequest) -> PruningResult<MilestoneIndex> {
        match request {
            PruneRequest::TargetIndex(target_index) => self.prune_by_target_index(cancel, target_index),
            PruneRequest::Depth(depth) => self.prune_by_depth(cancel, depth),
            PruneRequest::TargetSize(target_size) => self.prune_by_size(cancel, target_size),
        }
    }

    pub fn prune_by_depth(&self, cancel: &Listener, depth: MilestoneIndex) -> PruningResult<MilestoneIndex> {
        let _operation_guard = self.operation_lock.lock();
        let target_index = self.pruning_manager.target_index_by_depth(self.sync_state.confirmed_milestone_index(), depth)?;
        self.prune_database(cancel, target_index)
    }

    pub fn prune_by_target_index(&self, cancel: &Listener, target_index: MilestoneIndex) -> PruningResult<MilestoneIndex> {
        let _operation_guard = self.operation_lock.lock();
        self.prune_database(cancel, target_index)
    }

    pub fn prune_by_size(&self, cancel: &Listener, target_size: Option<u64>) -> PruningResult<MilestoneIndex> {
        let _operation_guard = self.operation_lock.lock();
        let target_index = self.target_index_by_size(target_size)?;
        self.prune_database(cancel, target_index)
    }

    /// Applies the autonomous retention policy after a milestone got confirmed. Failures are
    /// logged and dropped.
    pub fn on_confirmed_milestone(&self, cancel: &Listener, confirmed_index: MilestoneIndex) {
        if !self.sync_state.is_node_synced() {
            return;
        }

        let _operation_guard = self.operation_lock.lock();
        let pruning_config = &self.config.pruning;

        let mut target_index = 0;
        if pruning_config.milestones.enabled && confirmed_index > pruning_config.milestones.max_milestones_to_keep {
            target_index = confirmed_index - pruning_config.milestones.max_milestones_to_keep;
        }

        let mut pruning_by_size = false;
        if pruning_config.size.enabled && self.size_cooldown_elapsed() {
            match self.target_index_by_size(None) {
                Ok(size_target_index) if target_index == 0 || target_index < size_target_index => {
                    target_index = size_target_index;
                    pruning_by_size = true;
                }
                Ok(_) => {}
                Err(err) => debug!("size based pruning skipped: {}", err),
            }
        }

        if target_index == 0 {
            return;
        }

        if let Err(err) = self.prune_database(cancel, target_index) {
            debug!("pruning aborted: {}", err);
        }

        if pruning_by_size {
            self.status.write().last_size_pruning = Some(Instant::now());
        }
    }

    fn size_cooldown_elapsed(&self) -> bool {
        match self.status.read().last_size_pruning {
            Some(last) => last.elapsed() > self.config.pruning.size.cooldown_time,
            None => true,
        }
    }

    fn set_is_pruning(&self, is_pruning: bool) {
        self.status.write().is_pruning = is_pruning;
        self.notifier.notify(PruningNotification::StatusChanged(is_pruning));
    }

    fn enter_pruning(&self) -> PruningStatusGuard<'_> {
        self.set_is_pruning(true);
        PruningStatusGuard { processor: self }
    }

    fn snapshot_info(&self) -> PruningResult<SnapshotInfo> {
        self.storage
            .snapshot_store
            .read()
            .snapshot_info()
            .optional()?
            .ok_or_else(|| PruningError::Critical("snapshot info not found".to_string()))
    }

    fn target_index_by_size(&self, target_size: Option<u64>) -> PruningResult<MilestoneIndex> {
        if !self.config.pruning.size.enabled && target_size.is_none() {
            return Err(PruningError::NoPruningNeeded("size based pruning is disabled".to_string()));
        }

        let (tangle_info, utxo_info) = (&self.storage.tangle_info, &self.storage.utxo_info);
        if !tangle_info.compaction_supported() || !utxo_info.compaction_supported() {
            return Err(PruningError::CompactionNotSupported);
        }
        if tangle_info.compaction_running()? || utxo_info.compaction_running()? {
            return Err(PruningError::CompactionRunning);
        }

        let current_size = tangle_info.size()? + utxo_info.size()?;
        let target_size = target_size.unwrap_or(self.config.pruning.size.target_size.0);
        let snapshot_info = self.snapshot_info()?;
        self.pruning_manager.target_index_by_size(
            self.sync_state.confirmed_milestone_index(),
            snapshot_info.pruning_index,
            current_size,
            target_size,
        )
    }

    /// Prunes the database up to and including `target_index`. The caller must hold the operation lock.
    fn prune_database(&self, cancel: &Listener, target_index: MilestoneIndex) -> PruningResult<MilestoneIndex> {
        if cancel.is_triggered() {
            return Err(PruningError::PruningAborted);
        }

        if self.storage.tangle_info.compaction_running()? || self.storage.utxo_info.compaction_running()? {
            return Err(PruningError::CompactionRunning);
        }

        let target_index = target_index.min((self.min_tangle_history)());

        let snapshot_info = self.snapshot_info()?;
        self.pruning_manager.validate_target(&snapshot_info, target_index)?;

        let _status_guard = self.enter_pruning();

        let solid_entry_points = match self.traversal_service.compute_solid_entry_points(
            cancel,
            target_index,
            self.config.solid_entry_point_lookback(),
        ) {
            Ok(points) => points,
            Err(TraversalError::Aborted) => return Err(PruningError::PruningAborted),
            Err(err) => return Err(err.into()),
        };

        // The previous entry points stay until the cones they anchor are gone
        {
            let mut snapshot_write = self.storage.snapshot_store.write();
            let mut stored_points =
                snapshot_write.solid_entry_points().unwrap_or_else(|err| fatal("reading solid entry points failed", err));
            stored_points.extend(solid_entry_points.iter().copied());
            if let Err(err) = snapshot_write.set_solid_entry_points(&stored_points) {
                fatal("storing solid entry points failed", err);
            }
            if let Err(err) = snapshot_write.set_entry_point_index(target_index) {
                fatal("setting the entry point index failed", err);
            }
        }

        self.prune_unreferenced_blocks(snapshot_info.pruning_index);

        for milestone_index in snapshot_info.pruning_index + 1..=target_index {
            if cancel.is_triggered() {
                return Err(PruningError::PruningAborted);
            }
            self.prune_milestone_cone(cancel, milestone_index)?;
        }

        {
            let solid_entry_points: SolidEntryPoints = solid_entry_points.into_iter().collect();
            if let Err(err) = self.storage.snapshot_store.write().set_solid_entry_points(&solid_entry_points) {
                fatal("storing solid entry points failed", err);
            }
        }

        let pruned_options = self.storage.protocol_params_store.prune(target_index)?;
        if pruned_options > 0 {
            debug!("pruned {} protocol parameter milestone options", pruned_options);
        }

        Ok(target_index)
    }

    /// Deletes milestone `milestone_index`, its cone, ledger diff and unreferenced blocks.
    /// Anything short of an abort only skips the milestone.
    fn prune_milestone_cone(&self, cancel: &Listener, milestone_index: MilestoneIndex) -> PruningResult<()> {
        info!("Pruning milestone ({})...", milestone_index);

        let time_start = Instant::now();
        let (unreferenced_deleted, unreferenced_checked) = self.prune_unreferenced_blocks(milestone_index);
        let time_prune_unreferenced_blocks = Instant::now();

        let milestone = match self.storage.milestones_store.get(milestone_index).optional() {
            Ok(Some(milestone)) => milestone,
            Ok(None) => {
                warn!("Pruning milestone ({}) failed! Milestone not found!", milestone_index);
                return Ok(());
            }
            Err(err) => {
                warn!("Pruning milestone ({}) failed! {}", milestone_index, err);
                return Ok(());
            }
        };

        // Everything in the past of the milestone goes, including blocks of older milestones which are still stored
        let mut cone: Vec<BlockId> = Vec::new();
        let mut accept_all = |_: &BlockMetadata| -> TraversalResult<bool> { Ok(true) };
        let mut collect = |metadata: &BlockMetadata| -> TraversalResult<()> {
            cone.push(metadata.block_id);
            Ok(())
        };
        let mut ignore_missing = |_: BlockId| -> TraversalResult<()> { Ok(()) };
        match self.traversal_service.traverse_parents(
            cancel,
            &milestone.parents,
            &mut accept_all,
            &mut collect,
            Some(&mut ignore_missing),
            None,
            true,
        ) {
            Ok(()) => {}
            Err(TraversalError::Aborted) => return Err(PruningError::PruningAborted),
            Err(err) => {
                warn!("Pruning milestone ({}) failed! {}", milestone_index, err);
                return Ok(());
            }
        }
        let time_traverse_milestone_cone = Instant::now();

        if let Err(err) = self.prune_milestone(milestone_index, milestone.migrated_at()) {
            warn!("Pruning milestone ({}) failed! {}", milestone_index, err);
        }
        let time_prune_milestone = Instant::now();

        let blocks_checked = unreferenced_checked + cone.len();
        let blocks_deleted = unreferenced_deleted + self.prune_blocks(&cone);
        let time_prune_blocks = Instant::now();

        if let Err(err) = self.storage.snapshot_store.write().set_pruning_index(milestone_index) {
            fatal("setting the pruning index failed", err);
        }
        let time_set_snapshot_info = Instant::now();

        info!(
            "Pruning milestone ({}) took {:?}. Pruned {}/{} blocks.",
            milestone_index,
            truncate_to_millis(time_start.elapsed()),
            blocks_deleted,
            blocks_checked
        );

        self.notifier.notify(PruningNotification::IndexChanged(milestone_index));
        let time_pruning_milestone_index_changed = Instant::now();

        self.notifier.notify(PruningNotification::MetricsUpdated(PruningMetrics {
            milestone_index,
            blocks_pruned: blocks_deleted,
            duration_prune_unreferenced_blocks: time_prune_unreferenced_blocks.duration_since(time_start),
            duration_traverse_milestone_cone: time_traverse_milestone_cone.duration_since(time_prune_unreferenced_blocks),
            duration_prune_milestone: time_prune_milestone.duration_since(time_traverse_milestone_cone),
            duration_prune_blocks: time_prune_blocks.duration_since(time_prune_milestone),
            duration_set_snapshot_info: time_set_snapshot_info.duration_since(time_prune_blocks),
            duration_pruning_milestone_index_changed: time_pruning_milestone_index_changed.duration_since(time_set_snapshot_info),
            duration_total: time_start.elapsed(),
        }));

        Ok(())
    }

    /// Deletes the blocks recorded as unreferenced at `index` which are still unreferenced.
    /// Returns the number of deleted and checked blocks.
    fn prune_unreferenced_blocks(&self, index: MilestoneIndex) -> (usize, usize) {
        let block_ids = match self.storage.unreferenced_blocks_store.get(index) {
            Ok(block_ids) => block_ids,
            Err(err) => {
                warn!("Pruning unreferenced blocks of milestone ({}) failed! {}", index, err);
                return (0, 0);
            }
        };

        let mut unreferenced = Vec::with_capacity(block_ids.len());
        for block_id in block_ids {
            let metadata = self.storage.blocks_store.read().get_metadata(block_id).optional();
            match metadata {
                Ok(Some(metadata)) if !metadata.is_referenced() => unreferenced.push(block_id),
                Ok(_) => {}
                Err(err) => warn!("Reading metadata of block {} failed! {}", block_id, err),
            }
        }

        let deleted = self.prune_blocks(&unreferenced);
        if let Err(err) = self.storage.unreferenced_blocks_store.delete(index) {
            warn!("Deleting unreferenced blocks of milestone ({}) failed! {}", index, err);
        }
        (deleted, unreferenced.len())
    }

    /// Deletes the ledger diff, the receipts if configured and the milestone record
    fn prune_milestone(&self, milestone_index: MilestoneIndex, receipt_migrated_at: Option<MilestoneIndex>) -> StoreResult<()> {
        self.storage.utxo_store.read().prune_milestone(milestone_index, self.config.pruning.prune_receipts, receipt_migrated_at)?;
        self.storage.milestones_store.delete(DirectDbWriter::new(self.storage.tangle_db()), milestone_index)
    }

    fn prune_blocks(&self, block_ids: &[BlockId]) -> usize {
        let mut deleted = 0;
        for &block_id in block_ids {
            match self.delete_block(block_id) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(err) => warn!("Deleting block {} failed! {}", block_id, err),
            }
        }
        deleted
    }

    /// Deletes the payload and metadata of the block together with the edges its parents hold to it.
    /// Edges from the block to its own children are left for the children to clean up.
    fn delete_block(&self, block_id: BlockId) -> StoreResult<bool> {
        // Readers must not refill the caches between staging and commit
        let blocks_write = self.storage.blocks_store.write();
        let children_write = self.storage.children_store.write();

        let Some(metadata) = blocks_write.get_metadata(block_id).optional()? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        for &parent in metadata.parents.iter() {
            children_write.delete_batch(&mut batch, parent, block_id)?;
        }
        blocks_write.delete_batch(&mut batch, block_id)?;
        self.storage.tangle_db().write(batch)?;
        Ok(true)
    }
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::stores::{children::ChildrenStoreReader, utxo::UtxoStoreReader},
        processes::{
            sync::SyncManager,
            traversal_manager::{BlockIdHandler, DagTraversalManager, TraversalCondition, TraversalConsumer},
        },
        test_helpers::{MockStorageInfo, TangleBuilder},
    };
    use crossbeam_channel::{bounded, unbounded};
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };
    use tangle_consensus_core::{
        config::{ConfigBuilder, params::MAINNET_PARAMS},
        milestone::{Milestone, ProtocolParamsOption},
        snapshot::SolidEntryPoint,
    };
    use tangle_database::{
        create_temp_db,
        prelude::{ConnBuilder, StorageInfo},
        utils::DbLifetime,
    };
    use tangle_utils::triggers::SingleTrigger;

    const GB: u64 = 1_000_000_000;

    // Fields drop in declaration order, the DB lifetimes must go last
    struct TestContext {
        storage: Arc<ConsensusStorage>,
        traversal: Arc<dyn TraversalService>,
        processor: Arc<PruningProcessor>,
        sync: Arc<SyncManager>,
        builder: TangleBuilder,
        notifications: CrossbeamReceiver<PruningNotification>,
        _lifetimes: (DbLifetime, DbLifetime),
    }

    impl TestContext {
        fn new(config: Config) -> Self {
            Self::with(config, None, Arc::new(|| MilestoneIndex::MAX))
        }

        fn with(
            config: Config,
            storage_info: Option<(Arc<dyn StorageInfo>, Arc<dyn StorageInfo>)>,
            min_tangle_history: Arc<MinTangleHistoryFn>,
        ) -> Self {
            let (tangle_lifetime, tangle_db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
            let (utxo_lifetime, utxo_db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
            let storage = match storage_info {
                Some((tangle_info, utxo_info)) => ConsensusStorage::with_storage_info(tangle_db, utxo_db, tangle_info, utxo_info),
                None => ConsensusStorage::new(tangle_db, utxo_db),
            };
            let traversal: Arc<dyn TraversalService> = Arc::new(DagTraversalManager::new(
                storage.blocks_store.clone(),
                storage.children_store.clone(),
                storage.milestones_store.clone(),
                storage.snapshot_store.clone(),
            ));
            let sync = Arc::new(SyncManager::new(config.sync_tolerance));
            let notifier = Arc::new(PruningNotifier::new());
            let notifications = notifier.subscribe();
            let (_, receiver) = unbounded();
            let processor = Arc::new(PruningProcessor::new(
                receiver,
                Arc::new(config),
                storage.clone(),
                traversal.clone(),
                sync.clone(),
                min_tangle_history,
                notifier,
                SingleTrigger::new().listener,
            ));
            let builder = TangleBuilder::new(storage.clone());
            Self { storage, traversal, processor, sync, builder, notifications, _lifetimes: (tangle_lifetime, utxo_lifetime) }
        }

        fn snapshot_info(&self) -> SnapshotInfo {
            self.storage.snapshot_store.read().snapshot_info().unwrap()
        }

        /// Asserts that the cones of the given milestones only reach stored blocks or solid entry points
        fn assert_anchored(&self, milestones: impl IntoIterator<Item = MilestoneIndex>) {
            let shutdown = SingleTrigger::new();
            for index in milestones {
                let milestone = self.storage.milestones_store.get(index).unwrap();
                self.traversal
                    .traverse_parents(&shutdown.listener, &milestone.parents, &mut |_| Ok(true), &mut |_| Ok(()), None, None, false)
                    .unwrap_or_else(|err| panic!("cone of milestone {} is not anchored: {}", index, err));
            }
        }
    }

    /// Parks the pruning thread in `compute_solid_entry_points` until released
    struct GatedTraversal {
        inner: Arc<dyn TraversalService>,
        entered: CrossbeamSender<()>,
        release: CrossbeamReceiver<()>,
    }

    impl TraversalService for GatedTraversal {
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
            self.inner.traverse_parents(
                cancel,
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
            self.entered.send(()).unwrap();
            self.release.recv().unwrap();
            self.inner.compute_solid_entry_points(cancel, target_index, lookback)
        }
    }

    fn config_without_policies() -> Config {
        ConfigBuilder::new(MAINNET_PARAMS).edit_pruning(|p| p.size.enabled = false).build()
    }

    #[test]
    fn test_prune_by_depth() {
        let mut ctx = TestContext::new(config_without_policies());
        let genesis = ctx.builder.init_snapshot(0);
        let milestones = ctx.builder.build_chain(1, 40, 3);
        ctx.sync.set_confirmed_milestone_index(40);

        let shutdown = SingleTrigger::new();
        assert_eq!(ctx.processor.prune_by_depth(&shutdown.listener, 20).unwrap(), 20);

        let info = ctx.snapshot_info();
        assert_eq!((info.entry_point_index, info.pruning_index), (20, 20));
        for milestone in milestones.iter() {
            let pruned = milestone.index <= 20;
            assert_eq!(!ctx.storage.milestones_store.has(milestone.index).unwrap(), pruned);
            assert_eq!(ctx.storage.utxo_store.read().get_diff(milestone.index).optional().unwrap().is_none(), pruned);
            for &block_id in milestone.parents.iter() {
                assert_eq!(!ctx.storage.blocks_store.read().has(block_id).unwrap(), pruned);
            }
        }
        assert!(ctx.storage.unreferenced_blocks_store.get(20).unwrap().is_empty());
        let unreferenced = ctx.storage.unreferenced_blocks_store.get(21).unwrap();
        assert_eq!(unreferenced.len(), 1);
        assert!(ctx.storage.blocks_store.read().has(unreferenced[0]).unwrap());

        let points = ctx.storage.snapshot_store.read().solid_entry_points().unwrap();
        assert!(!points.contains(&genesis));
        assert!(milestones[19].parents.iter().all(|block_id| points.contains(block_id)));
        ctx.assert_anchored(21..=40);
    }

    #[test]
    fn test_target_validation() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 40, 2);
        ctx.sync.set_confirmed_milestone_index(40);
        let shutdown = SingleTrigger::new();

        assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, 5), Err(PruningError::NotEnoughHistory(_))));
        assert!(matches!(ctx.processor.prune_by_depth(&shutdown.listener, 40), Err(PruningError::NotEnoughHistory(_))));
        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 20).unwrap(), 20);

        let info = ctx.snapshot_info();
        ctx.notifications.try_iter().for_each(drop);
        for target in [20, 15] {
            assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, target), Err(PruningError::NoPruningNeeded(_))));
        }
        for target in 21..=25 {
            assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, target), Err(PruningError::NotEnoughHistory(_))));
        }
        assert_eq!(ctx.snapshot_info(), info);
        assert!(ctx.storage.milestones_store.has(21).unwrap());
        // Failed validation does not touch the pruning status
        assert!(ctx.notifications.try_iter().next().is_none());

        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 26).unwrap(), 26);
        ctx.assert_anchored(27..=40);

        let aborted = SingleTrigger::new();
        aborted.fire();
        assert!(matches!(ctx.processor.prune_by_target_index(&aborted.listener, 35), Err(PruningError::PruningAborted)));
        assert_eq!(ctx.snapshot_info().pruning_index, 26);
    }

    #[test]
    fn test_target_clamped_by_min_tangle_history() {
        let mut ctx = TestContext::with(config_without_policies(), None, Arc::new(|| 12));
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 30, 2);
        let shutdown = SingleTrigger::new();

        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 25).unwrap(), 12);
        assert_eq!(ctx.snapshot_info().pruning_index, 12);
        assert!(ctx.storage.milestones_store.has(13).unwrap());
    }

    #[test]
    fn test_interrupted_prune_resumes() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 40, 3);

        // Stop right after milestone 10 was pruned
        let interrupt = SingleTrigger::new();
        let trigger = interrupt.trigger.clone();
        ctx.processor.notifier().register_listener(move |notification| {
            if *notification == PruningNotification::IndexChanged(10) {
                trigger.trigger();
            }
        });
        assert!(matches!(ctx.processor.prune_by_target_index(&interrupt.listener, 20), Err(PruningError::PruningAborted)));
        assert!(!ctx.processor.is_pruning());

        let info = ctx.snapshot_info();
        assert_eq!((info.entry_point_index, info.pruning_index), (20, 10));
        assert!(!ctx.storage.milestones_store.has(10).unwrap());
        assert!(ctx.storage.milestones_store.has(11).unwrap());
        ctx.assert_anchored(21..=40);

        // Same target again is rejected without mutation, a later target completes
        let shutdown = SingleTrigger::new();
        assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, 20), Err(PruningError::NotEnoughHistory(_))));
        assert_eq!(ctx.snapshot_info(), info);
        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 26).unwrap(), 26);
        assert!((11..=26).all(|index| !ctx.storage.milestones_store.has(index).unwrap()));
        ctx.assert_anchored(27..=40);
    }

    #[test]
    fn test_crash_after_entry_points_were_stored() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 40, 3);

        // Entry points and entry point index are persisted, nothing was pruned yet
        let shutdown = SingleTrigger::new();
        let points = ctx.traversal.compute_solid_entry_points(&shutdown.listener, 20, 15).unwrap();
        {
            let mut snapshot_store = ctx.storage.snapshot_store.write();
            let mut stored = snapshot_store.solid_entry_points().unwrap();
            stored.extend(points);
            snapshot_store.set_solid_entry_points(&stored).unwrap();
            snapshot_store.set_entry_point_index(20).unwrap();
        }
        ctx.assert_anchored(1..=40);

        assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, 20), Err(PruningError::NotEnoughHistory(_))));
        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 26).unwrap(), 26);
        ctx.assert_anchored(27..=40);
    }

    #[test]
    fn test_missing_milestone_is_skipped() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        let milestones = ctx.builder.build_chain(1, 30, 2);
        ctx.storage.milestones_store.delete(DirectDbWriter::new(ctx.storage.tangle_db()), 5).unwrap();

        let shutdown = SingleTrigger::new();
        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 10).unwrap(), 10);
        assert_eq!(ctx.snapshot_info().pruning_index, 10);

        // The blocks of milestone 5 are still in the past of milestone 6 and go with its cone
        assert!(milestones[4].parents.iter().all(|block_id| !ctx.storage.blocks_store.read().has(*block_id).unwrap()));
        // The ledger diff of the skipped milestone stays
        assert!(ctx.storage.utxo_store.read().get_diff(5).optional().unwrap().is_some());
        assert!(ctx.storage.utxo_store.read().get_diff(6).optional().unwrap().is_none());
        ctx.assert_anchored(11..=30);
    }

    #[test]
    fn test_notifications() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 20, 2);
        let shutdown = SingleTrigger::new();

        assert!(ctx.processor.prune_by_target_index(&shutdown.listener, 3).is_err());
        assert!(ctx.notifications.try_iter().next().is_none());

        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 10).unwrap(), 10);
        let notifications = ctx.notifications.try_iter().collect::<Vec<_>>();
        assert_eq!(notifications.len(), 2 + 2 * 10);
        assert_eq!(notifications[0], PruningNotification::StatusChanged(true));
        assert_eq!(notifications[notifications.len() - 1], PruningNotification::StatusChanged(false));
        for (i, pair) in notifications[1..notifications.len() - 1].chunks(2).enumerate() {
            let index = i as MilestoneIndex + 1;
            assert_eq!(pair[0], PruningNotification::IndexChanged(index));
            match &pair[1] {
                PruningNotification::MetricsUpdated(metrics) => {
                    assert_eq!(metrics.milestone_index, index);
                    // Two cone blocks and the unreferenced block of the milestone
                    assert_eq!(metrics.blocks_pruned, 3);
                    assert!(metrics.duration_total >= metrics.duration_prune_blocks);
                }
                other => panic!("unexpected notification {:?}", other),
            }
        }
    }

    #[test]
    fn test_confirmed_milestone_trigger() {
        let config = ConfigBuilder::new(MAINNET_PARAMS)
            .edit_pruning(|p| {
                p.size.enabled = false;
                p.milestones.enabled = true;
                p.milestones.max_milestones_to_keep = 20;
            })
            .build();
        let mut ctx = TestContext::new(config);
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 40, 2);
        let shutdown = SingleTrigger::new();

        // Not synced
        ctx.sync.set_latest_milestone_index(40);
        ctx.sync.set_confirmed_milestone_index(30);
        ctx.processor.on_confirmed_milestone(&shutdown.listener, 30);
        assert_eq!(ctx.snapshot_info().pruning_index, 0);

        ctx.sync.set_confirmed_milestone_index(40);
        ctx.processor.on_confirmed_milestone(&shutdown.listener, 40);
        assert_eq!(ctx.snapshot_info().pruning_index, 20);

        // Below the pruning threshold the failure is swallowed
        ctx.processor.on_confirmed_milestone(&shutdown.listener, 40);
        assert_eq!(ctx.snapshot_info().pruning_index, 20);
    }

    #[test]
    fn test_concurrent_prune_and_trigger() {
        let config = ConfigBuilder::new(MAINNET_PARAMS)
            .edit_pruning(|p| {
                p.size.enabled = false;
                p.milestones.enabled = true;
                p.milestones.max_milestones_to_keep = 10;
            })
            .build();
        let mut ctx = TestContext::new(config);
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 40, 3);
        ctx.sync.set_latest_milestone_index(40);
        ctx.sync.set_confirmed_milestone_index(40);

        let done = Arc::new(AtomicBool::new(false));
        let observer = {
            let storage = ctx.storage.clone();
            let processor = ctx.processor.clone();
            let done = done.clone();
            thread::spawn(move || {
                let (mut entry_point_index, mut pruning_index) = (0, 0);
                while !done.load(Ordering::Acquire) {
                    let _ = processor.is_pruning();
                    let info = storage.snapshot_store.read().snapshot_info().unwrap();
                    assert!(info.entry_point_index >= entry_point_index, "entry point index went back");
                    assert!(info.pruning_index >= pruning_index, "pruning index went back");
                    assert!(info.pruning_index <= info.entry_point_index);
                    (entry_point_index, pruning_index) = (info.entry_point_index, info.pruning_index);
                }
            })
        };

        let explicit = {
            let processor = ctx.processor.clone();
            thread::spawn(move || processor.prune_by_target_index(&SingleTrigger::new().listener, 20))
        };
        let triggered = {
            let processor = ctx.processor.clone();
            thread::spawn(move || processor.on_confirmed_milestone(&SingleTrigger::new().listener, 40))
        };

        // Whichever runs first, the trigger target of 30 wins and the explicit target is either
        // reached or rejected as already pruned
        match explicit.join().unwrap() {
            Ok(index) => assert_eq!(index, 20),
            Err(err) => assert!(err.is_benign(), "unexpected error: {}", err),
        }
        triggered.join().unwrap();
        done.store(true, Ordering::Release);
        observer.join().unwrap();

        let info = ctx.snapshot_info();
        assert_eq!((info.entry_point_index, info.pruning_index), (30, 30));
        assert!(!ctx.processor.is_pruning());
        ctx.assert_anchored(31..=40);
    }

    #[test]
    fn test_status_readable_while_pruning() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 30, 2);
        ctx.sync.set_confirmed_milestone_index(30);

        let (entered_sender, entered) = bounded(1);
        let (release, release_receiver) = bounded(1);
        let traversal: Arc<dyn TraversalService> =
            Arc::new(GatedTraversal { inner: ctx.traversal.clone(), entered: entered_sender, release: release_receiver });
        let (_, receiver) = unbounded();
        let processor = Arc::new(PruningProcessor::new(
            receiver,
            Arc::new(config_without_policies()),
            ctx.storage.clone(),
            traversal,
            ctx.sync.clone(),
            Arc::new(|| MilestoneIndex::MAX),
            Arc::new(PruningNotifier::new()),
            SingleTrigger::new().listener,
        ));

        let handle = {
            let processor = processor.clone();
            thread::spawn(move || processor.prune_by_target_index(&SingleTrigger::new().listener, 15))
        };
        entered.recv().unwrap();

        // The prune holds the operation lock, the status lock stays free
        assert!(processor.is_pruning());
        assert!(processor.operation_lock().try_lock().is_none());
        assert_eq!(ctx.snapshot_info().pruning_index, 0);

        release.send(()).unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 15);
        assert!(!processor.is_pruning());
        assert!(processor.operation_lock().try_lock().is_some());
    }

    #[test]
    fn test_deleted_blocks_stay_deleted_under_concurrent_reads() {
        let mut ctx = TestContext::new(config_without_policies());
        ctx.builder.init_snapshot(0);
        let milestones = ctx.builder.build_chain(1, 40, 4);
        ctx.sync.set_confirmed_milestone_index(40);

        let pruned_blocks = milestones.iter().filter(|m| m.index <= 25).flat_map(|m| m.parents.iter().copied()).collect::<Vec<_>>();
        // Warm the metadata cache
        for &block_id in pruned_blocks.iter() {
            ctx.storage.blocks_store.read().get_metadata(block_id).unwrap();
        }

        let done = Arc::new(AtomicBool::new(false));
        let readers = (0..2)
            .map(|_| {
                let storage = ctx.storage.clone();
                let pruned_blocks = pruned_blocks.clone();
                let done = done.clone();
                thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        for &block_id in pruned_blocks.iter() {
                            let _ = storage.blocks_store.read().get_metadata(block_id);
                            let _ = storage.children_store.read().get(block_id).map(|children| children.read().len());
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        let shutdown = SingleTrigger::new();
        assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 25).unwrap(), 25);
        done.store(true, Ordering::Release);
        readers.into_iter().for_each(|reader| reader.join().unwrap());

        let blocks_store = ctx.storage.blocks_store.read();
        for &block_id in pruned_blocks.iter() {
            assert!(!blocks_store.has(block_id).unwrap());
            assert!(blocks_store.get_metadata(block_id).optional().unwrap().is_none());
        }
        drop(blocks_store);
        ctx.assert_anchored(26..=40);
    }

    #[test]
    fn test_size_policy() {
        let config = ConfigBuilder::new(MAINNET_PARAMS)
            .edit_pruning(|p| {
                p.size.enabled = true;
                p.size.target_size = tangle_utils::bytes::ByteSize(30 * GB);
            })
            .build();
        let (tangle_info, utxo_info) = (MockStorageInfo::new(60 * GB), MockStorageInfo::new(40 * GB));
        let mut ctx = TestContext::with(config, Some((tangle_info.clone(), utxo_info.clone())), Arc::new(|| MilestoneIndex::MAX));
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 100, 1);
        ctx.sync.set_confirmed_milestone_index(100);
        let shutdown = SingleTrigger::new();

        let manager = PruningManager::new(MAINNET_PARAMS.additional_pruning_threshold, 10.0);
        let expected = manager.target_index_by_size(100, 0, 100 * GB, 30 * GB).unwrap();
        assert!((70..=75).contains(&expected));

        ctx.processor.on_confirmed_milestone(&shutdown.listener, 100);
        assert_eq!(ctx.snapshot_info().pruning_index, expected);

        // Cooling down
        ctx.processor.on_confirmed_milestone(&shutdown.listener, 100);
        assert_eq!(ctx.snapshot_info().pruning_index, expected);

        // Explicit requests ignore the cooldown
        let next = manager.target_index_by_size(100, expected, 100 * GB, 30 * GB).unwrap();
        assert_eq!(ctx.processor.prune_by_size(&shutdown.listener, None).unwrap(), next);

        utxo_info.set_compaction_running(true);
        assert!(matches!(ctx.processor.prune_by_size(&shutdown.listener, None), Err(PruningError::CompactionRunning)));
        assert!(matches!(ctx.processor.prune_by_target_index(&shutdown.listener, 99), Err(PruningError::CompactionRunning)));
        utxo_info.set_compaction_running(false);

        tangle_info.set_compaction_supported(false);
        assert!(matches!(ctx.processor.prune_by_size(&shutdown.listener, None), Err(PruningError::CompactionNotSupported)));
        tangle_info.set_compaction_supported(true);

        tangle_info.set_size(0);
        utxo_info.set_size(10 * GB);
        assert!(matches!(ctx.processor.prune_by_size(&shutdown.listener, None), Err(PruningError::NoPruningNeeded(_))));
        assert!(matches!(ctx.processor.prune_by_size(&shutdown.listener, Some(GB)), Ok(_)));
    }

    #[test]
    fn test_size_override_when_disabled() {
        let (tangle_info, utxo_info) = (MockStorageInfo::new(10 * GB), MockStorageInfo::new(0));
        let mut ctx = TestContext::with(config_without_policies(), Some((tangle_info, utxo_info)), Arc::new(|| MilestoneIndex::MAX));
        ctx.builder.init_snapshot(0);
        ctx.builder.build_chain(1, 50, 1);
        ctx.sync.set_confirmed_milestone_index(50);
        let shutdown = SingleTrigger::new();

        assert!(matches!(ctx.processor.prune_by_size(&shutdown.listener, None), Err(PruningError::NoPruningNeeded(_))));
        // 4.5 GB may stay out of 10 GB spread over 50 milestones
        let pruned_to = ctx.processor.prune_by_size(&shutdown.listener, Some(5 * GB)).unwrap();
        assert!((27..=28).contains(&pruned_to));
    }

    #[test]
    fn test_receipts_and_protocol_params() {
        for prune_receipts in [true, false] {
            let config = ConfigBuilder::new(MAINNET_PARAMS)
                .edit_pruning(|p| {
                    p.size.enabled = false;
                    p.prune_receipts = prune_receipts;
                })
                .build();
            let mut ctx = TestContext::new(config);
            let mut parent = ctx.builder.init_snapshot(0);
            for index in 1..=30 {
                let block_id = ctx.builder.add_block(&[parent], Some(index));
                let mut milestone = Milestone::new(index, index as u64, BlockId::from(1_000 + index as u64), vec![block_id]);
                if index == 3 || index == 25 {
                    milestone = milestone.with_receipt(index, false);
                }
                if [2, 8, 25].contains(&index) {
                    milestone = milestone.with_protocol_params(ProtocolParamsOption { target_index: index, protocol_version: 2, params: vec![] });
                }
                ctx.builder.insert_milestone(milestone);
                parent = block_id;
            }

            let shutdown = SingleTrigger::new();
            assert_eq!(ctx.processor.prune_by_target_index(&shutdown.listener, 10).unwrap(), 10);

            let utxo_store = ctx.storage.utxo_store.read();
            assert_eq!(utxo_store.receipts(3).unwrap().is_empty(), prune_receipts);
            assert_eq!(utxo_store.receipts(25).unwrap().len(), 1);

            let options = ctx.storage.protocol_params_store.options().unwrap();
            assert_eq!(options.iter().map(|option| option.target_index).collect::<Vec<_>>(), vec![8, 25]);
            ctx.assert_anchored(11..=30);
        }
    }
}
