use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use tangle_consensus::{
    consensus::Consensus, model::stores::snapshot::SnapshotStoreReader, pipeline::pruning_processor::processor::PruneRequest,
};
use tangle_consensus_core::MilestoneIndex;
use tangle_core::{core::Core, info, service::Service, warn};
use tangle_database::prelude::StoreResultExtensions;

/// Runs a single prune request, or the configured retention policy when no request is given,
/// and shuts the core down afterwards
pub struct PruneJob {
    consensus: Arc<Consensus>,
    request: Option<PruneRequest>,
    confirmed_index: MilestoneIndex,
}

impl PruneJob {
    pub fn new(consensus: Arc<Consensus>, request: Option<PruneRequest>, confirmed_index: MilestoneIndex) -> Self {
        Self { consensus, request, confirmed_index }
    }

    fn run(&self) {
        match self.request {
            Some(request) => match self.consensus.prune_blocking(request) {
                Ok(index) => info!("Pruned the database up to milestone {}", index),
                Err(err) if err.is_benign() => info!("Nothing to prune, {}", err),
                Err(err) => warn!("Pruning failed: {}", err),
            },
            None => {
                self.consensus.notify_confirmed_milestone(self.confirmed_index);
                self.consensus.flush();
                match self.consensus.storage.snapshot_store.read().snapshot_info().optional() {
                    Ok(Some(info)) => info!("Retention policy applied, pruning index: {}", info.pruning_index),
                    Ok(None) => warn!("The database holds no snapshot info"),
                    Err(err) => warn!("Reading the snapshot info failed: {}", err),
                }
            }
        }
    }
}

impl Service for PruneJob {
    fn ident(self: Arc<PruneJob>) -> &'static str {
        "prune-job"
    }

    fn start(self: Arc<PruneJob>, core: Arc<Core>) -> Vec<JoinHandle<()>> {
        vec![
            thread::Builder::new()
                .name("prune-job".to_string())
                .spawn(move || {
                    self.run();
                    core.shutdown();
                })
                .unwrap(),
        ]
    }

    fn stop(self: Arc<PruneJob>) {
        // A running prune observes the consensus exit signal
    }
}
