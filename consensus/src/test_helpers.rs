//! Builders for populating a [`ConsensusStorage`] with a synthetic tangle in tests and benchmarks

use crate::{
    consensus::storage::ConsensusStorage,
    model::stores::{
        milestones::MilestonesStore,
        snapshot::SnapshotStore,
        utxo::{UtxoStore, UtxoStoreReader},
    },
};
use rocksdb::WriteBatch;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tangle_consensus_core::{
    BlockId, MilestoneIndex,
    block::{Block, BlockMetadata},
    milestone::Milestone,
    snapshot::{SnapshotInfo, SolidEntryPoint, SolidEntryPoints},
    utxo::{Output, OutputId, Receipt, Spent, TRANSACTION_ID_SIZE},
};
use tangle_database::prelude::{StorageInfo, StoreResult, StoreResultExtensions};

// Keeps generated ids clear of the small ids tests pick by hand
const FIRST_BLOCK_ID: u64 = 1 << 32;

/// Writes blocks, milestones and ledger diffs the way the node would after solidification and confirmation
pub struct TangleBuilder {
    storage: Arc<ConsensusStorage>,
    next_block_id: u64,
    tips: Vec<BlockId>,
    previous_tips: Vec<BlockId>,
}

impl TangleBuilder {
    pub fn new(storage: Arc<ConsensusStorage>) -> Self {
        Self { storage, next_block_id: FIRST_BLOCK_ID, tips: Vec::new(), previous_tips: Vec::new() }
    }

    fn next_block_id(&mut self) -> BlockId {
        let block_id = BlockId::from(self.next_block_id);
        self.next_block_id += 1;
        block_id
    }

    /// Initializes the snapshot info at `index` with a single solid entry point and returns its id
    pub fn init_snapshot(&mut self, index: MilestoneIndex) -> BlockId {
        let genesis = self.next_block_id();
        let mut snapshot_store = self.storage.snapshot_store.write();
        snapshot_store.set_snapshot_info(SnapshotInfo::new(index, 0)).unwrap();
        let points: SolidEntryPoints = [SolidEntryPoint::new(genesis, index)].into_iter().collect();
        snapshot_store.set_solid_entry_points(&points).unwrap();
        self.tips = vec![genesis];
        genesis
    }

    /// Stores a solid block with the given parents. `referenced_index` is the milestone which referenced it.
    pub fn add_block(&mut self, parents: &[BlockId], referenced_index: Option<MilestoneIndex>) -> BlockId {
        let block_id = self.next_block_id();
        let block = Arc::new(Block::new(block_id, parents.to_vec(), block_id.as_bytes().to_vec()));
        let mut metadata = BlockMetadata::new(block_id, parents.to_vec());
        metadata.solid = true;
        metadata.referenced_index = referenced_index;

        let blocks_write = self.storage.blocks_store.write();
        let children_write = self.storage.children_store.write();
        let mut batch = WriteBatch::default();
        blocks_write.insert_batch(&mut batch, block, metadata).unwrap();
        for &parent in parents {
            children_write.insert_batch(&mut batch, parent, block_id).unwrap();
        }
        self.storage.tangle_db().write(batch).unwrap();
        block_id
    }

    /// Stores a block no milestone referenced and records it as seen while `seen_at` was the latest milestone
    pub fn add_unreferenced_block(&mut self, parents: &[BlockId], seen_at: MilestoneIndex) -> BlockId {
        let block_id = self.add_block(parents, None);
        self.storage.unreferenced_blocks_store.insert(seen_at, block_id).unwrap();
        block_id
    }

    pub fn add_milestone(&mut self, index: MilestoneIndex, parents: Vec<BlockId>) -> Arc<Milestone> {
        let block_id = self.next_block_id();
        self.insert_milestone(Milestone::new(index, index as u64, block_id, parents))
    }

    /// Stores the milestone with its protocol parameters option and books a ledger diff for it. The diff
    /// creates one output and consumes the output of the previous milestone if it is still stored.
    pub fn insert_milestone(&mut self, milestone: Milestone) -> Arc<Milestone> {
        let milestone = Arc::new(milestone);
        self.storage.milestones_store.insert(milestone.clone()).unwrap();
        if let Some(option) = milestone.options.protocol_params.as_ref() {
            self.storage.protocol_params_store.insert(Arc::new(option.clone())).unwrap();
        }

        let index = milestone.index;
        let output = Output {
            output_id: milestone_output_id(index),
            block_id: milestone.block_id,
            booked_index: index,
            amount: 1_000_000,
            address: index.to_le_bytes().to_vec(),
        };
        let mut utxo_store = self.storage.utxo_store.write();
        let spents = match index.checked_sub(1) {
            Some(previous) if utxo_store.get_output(milestone_output_id(previous)).optional().unwrap().is_some() => vec![Spent {
                output_id: milestone_output_id(previous),
                transaction_id_spent: transaction_id(index),
                spent_index: index,
            }],
            _ => vec![],
        };
        utxo_store.apply_confirmation(index, vec![output], spents).unwrap();
        if let Some(receipt) = milestone.options.receipt.as_ref() {
            utxo_store
                .add_receipt(Receipt { migrated_at: receipt.migrated_at, milestone_index: index, is_final: receipt.is_final, funds: vec![] })
                .unwrap();
        }
        milestone
    }

    /// Builds milestones `from..=to`, each confirming `blocks_per_milestone` new blocks. Every block
    /// approves tips of the previous milestone; the first block of a round also approves a block two rounds
    /// back so entry points span more than one milestone. Each round leaves one unreferenced block behind.
    pub fn build_chain(&mut self, from: MilestoneIndex, to: MilestoneIndex, blocks_per_milestone: usize) -> Vec<Arc<Milestone>> {
        assert!(!self.tips.is_empty(), "init_snapshot must be called first");
        assert!(blocks_per_milestone > 0);

        let mut milestones = Vec::new();
        for index in from..=to {
            let mut round = Vec::with_capacity(blocks_per_milestone);
            for j in 0..blocks_per_milestone {
                let mut parents = vec![self.tips[j % self.tips.len()]];
                let second = self.tips[(j * 7 + index as usize) % self.tips.len()];
                if !parents.contains(&second) {
                    parents.push(second);
                }
                if j == 0 && !self.previous_tips.is_empty() {
                    let old = self.previous_tips[index as usize % self.previous_tips.len()];
                    if !parents.contains(&old) {
                        parents.push(old);
                    }
                }
                round.push(self.add_block(&parents, Some(index)));
            }

            let tip = self.tips[index as usize % self.tips.len()];
            self.add_unreferenced_block(&[tip], index);

            milestones.push(self.add_milestone(index, round.clone()));
            self.previous_tips = std::mem::replace(&mut self.tips, round);
        }
        milestones
    }
}

fn transaction_id(index: MilestoneIndex) -> [u8; TRANSACTION_ID_SIZE] {
    let mut id = [0u8; TRANSACTION_ID_SIZE];
    id[..4].copy_from_slice(&index.to_be_bytes());
    id
}

pub fn milestone_output_id(index: MilestoneIndex) -> OutputId {
    OutputId::new(transaction_id(index), 0)
}

/// A [`StorageInfo`] whose answers are set by the test
pub struct MockStorageInfo {
    size: AtomicU64,
    compaction_supported: AtomicBool,
    compaction_running: AtomicBool,
}

impl MockStorageInfo {
    pub fn new(size: u64) -> Arc<Self> {
        Arc::new(Self { size: AtomicU64::new(size), compaction_supported: AtomicBool::new(true), compaction_running: AtomicBool::new(false) })
    }

    pub fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::SeqCst);
    }

    pub fn set_compaction_supported(&self, supported: bool) {
        self.compaction_supported.store(supported, Ordering::SeqCst);
    }

    pub fn set_compaction_running(&self, running: bool) {
        self.compaction_running.store(running, Ordering::SeqCst);
    }
}

impl StorageInfo for MockStorageInfo {
    fn size(&self) -> StoreResult<u64> {
        Ok(self.size.load(Ordering::SeqCst))
    }

    fn compaction_supported(&self) -> bool {
        self.compaction_supported.load(Ordering::SeqCst)
    }

    fn compaction_running(&self) -> StoreResult<bool> {
        Ok(self.compaction_running.load(Ordering::SeqCst))
    }
}
