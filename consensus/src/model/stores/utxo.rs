use super::milestones::MilestoneKey;
use rocksdb::WriteBatch;
use std::sync::Arc;
use tangle_consensus_core::{
    MilestoneIndex,
    utxo::{LedgerDiff, Output, OutputId, Receipt, Spent},
};
use tangle_database::{
    prelude::{BatchDbWriter, CachePolicy, CachedDbAccess, CachedDbItem, DB, DbSetAccess, DirectDbWriter, StoreError, StoreResult},
    registry::DatabaseStorePrefixes,
};

/// Reader API for `UtxoStore`.
pub trait UtxoStoreReader {
    fn ledger_index(&self) -> StoreResult<MilestoneIndex>;
    fn get_diff(&self, index: MilestoneIndex) -> StoreResult<Arc<LedgerDiff>>;
    fn get_output(&self, output_id: OutputId) -> StoreResult<Output>;
    fn get_spent(&self, output_id: OutputId) -> StoreResult<Spent>;
    fn receipts(&self, migrated_at: MilestoneIndex) -> StoreResult<Vec<Receipt>>;
}

pub trait UtxoStore: UtxoStoreReader {
    /// Books the outputs created and consumed by the cone of milestone `index` and advances the ledger index
    fn apply_confirmation(&mut self, index: MilestoneIndex, outputs: Vec<Output>, spents: Vec<Spent>) -> StoreResult<()>;
    fn add_receipt(&mut self, receipt: Receipt) -> StoreResult<()>;
}

/// The UTXO ledger of the node. Lives in its own database next to the tangle.
#[derive(Clone)]
pub struct DbUtxoStore {
    db: Arc<DB>,
    diffs: CachedDbAccess<MilestoneKey, Arc<LedgerDiff>>,
    outputs: CachedDbAccess<OutputId, Output>,
    spents: CachedDbAccess<OutputId, Spent>,
    receipts: DbSetAccess<MilestoneKey, Receipt>,
    ledger_index: CachedDbItem<MilestoneIndex>,
}

impl DbUtxoStore {
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy) -> Self {
        Self {
            db: Arc::clone(&db),
            diffs: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::LedgerDiffs.into()),
            outputs: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Outputs.into()),
            spents: CachedDbAccess::new(db.clone(), cache_policy, DatabaseStorePrefixes::Spents.into()),
            receipts: DbSetAccess::new(db.clone(), DatabaseStorePrefixes::Receipts.into()),
            ledger_index: CachedDbItem::new(db, DatabaseStorePrefixes::LedgerIndex.into()),
        }
    }

    /// Deletes the ledger diff of milestone `index` together with every output it consumed and the
    /// matching spent records. The receipts migrated at `receipt_migrated_at` are deleted as well
    /// if `prune_receipts` is set. All deletions are written in a single batch.
    pub fn prune_milestone(
        &self,
        index: MilestoneIndex,
        prune_receipts: bool,
        receipt_migrated_at: Option<MilestoneIndex>,
    ) -> StoreResult<()> {
        let diff = self.diffs.read(index.into())?;

        let mut batch = WriteBatch::default();
        self.outputs.delete_many(BatchDbWriter::new(&mut batch), diff.spents.iter().copied())?;
        self.spents.delete_many(BatchDbWriter::new(&mut batch), diff.spents.iter().copied())?;
        self.diffs.delete(BatchDbWriter::new(&mut batch), index.into())?;

        if prune_receipts && let Some(migrated_at) = receipt_migrated_at {
            self.receipts.delete_bucket(BatchDbWriter::new(&mut batch), migrated_at.into())?;
        }

        self.db.write(batch)?;
        Ok(())
    }
}

impl UtxoStoreReader for DbUtxoStore {
    fn ledger_index(&self) -> StoreResult<MilestoneIndex> {
        self.ledger_index.read()
    }

    fn get_diff(&self, index: MilestoneIndex) -> StoreResult<Arc<LedgerDiff>> {
        self.diffs.read(index.into())
    }

    fn get_output(&self, output_id: OutputId) -> StoreResult<Output> {
        self.outputs.read(output_id)
    }

    fn get_spent(&self, output_id: OutputId) -> StoreResult<Spent> {
        self.spents.read(output_id)
    }

    fn receipts(&self, migrated_at: MilestoneIndex) -> StoreResult<Vec<Receipt>> {
        self.receipts.bucket_iterator(migrated_at.into()).collect()
    }
}

impl UtxoStore for DbUtxoStore {
    fn apply_confirmation(&mut self, index: MilestoneIndex, outputs: Vec<Output>, spents: Vec<Spent>) -> StoreResult<()> {
        if self.diffs.has(index.into())? {
            return Err(StoreError::KeyAlreadyExists(MilestoneKey::from(index).to_string()));
        }
        let diff = LedgerDiff {
            index,
            outputs: outputs.iter().map(|output| output.output_id).collect(),
            spents: spents.iter().map(|spent| spent.output_id).collect(),
        };

        let mut batch = WriteBatch::default();
        self.outputs.write_many(BatchDbWriter::new(&mut batch), outputs.into_iter().map(|output| (output.output_id, output)))?;
        self.spents.write_many(BatchDbWriter::new(&mut batch), spents.into_iter().map(|spent| (spent.output_id, spent)))?;
        self.diffs.write(BatchDbWriter::new(&mut batch), index.into(), Arc::new(diff))?;
        self.ledger_index.write(BatchDbWriter::new(&mut batch), &index)?;
        self.db.write(batch)?;
        Ok(())
    }

    fn add_receipt(&mut self, receipt: Receipt) -> StoreResult<()> {
        self.receipts.write(DirectDbWriter::new(&self.db), receipt.migrated_at.into(), receipt)
    }
}
