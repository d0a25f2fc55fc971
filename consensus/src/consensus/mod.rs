pub mod storage;

use crate::{
    errors::{PruningError, PruningResult},
    model::stores::DB,
    pipeline::pruning_processor::{
        notifier::PruningNotifier,
        processor::{PruneRequest, PruningProcessingMessage, PruningProcessor},
    },
    processes::traversal_manager::{DagTraversalManager, TraversalService},
};
use crossbeam_channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender, bounded, unbounded};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use storage::ConsensusStorage;
use tangle_consensus_core::{
    MilestoneIndex,
    api::{MinTangleHistoryFn, SyncStateProvider},
    config::Config,
};
use tangle_core::{service::Service, trace};
use tangle_utils::triggers::SingleTrigger;

pub struct Consensus {
    // DB
    pub storage: Arc<ConsensusStorage>,

    // Config
    pub config: Arc<Config>,

    // Channels
    pruning_sender: CrossbeamSender<PruningProcessingMessage>,

    // Processors
    pruning_processor: Arc<PruningProcessor>,

    // Fired on exit, cancels a running prune
    shutdown: SingleTrigger,
}

impl Consensus {
    pub fn new(
        config: Arc<Config>,
        tangle_db: Arc<DB>,
        utxo_db: Arc<DB>,
        sync_state: Arc<dyn SyncStateProvider>,
        min_tangle_history: Arc<MinTangleHistoryFn>,
    ) -> Self {
        Self::with_storage(config, ConsensusStorage::new(tangle_db, utxo_db), sync_state, min_tangle_history)
    }

    pub fn with_storage(
        config: Arc<Config>,
        storage: Arc<ConsensusStorage>,
        sync_state: Arc<dyn SyncStateProvider>,
        min_tangle_history: Arc<MinTangleHistoryFn>,
    ) -> Self {
        let traversal_service: Arc<dyn TraversalService> = Arc::new(DagTraversalManager::new(
            storage.blocks_store.clone(),
            storage.children_store.clone(),
            storage.milestones_store.clone(),
            storage.snapshot_store.clone(),
        ));

        let (pruning_sender, pruning_receiver): (CrossbeamSender<PruningProcessingMessage>, CrossbeamReceiver<PruningProcessingMessage>) =
            unbounded();
        let shutdown = SingleTrigger::new();

        let pruning_processor = Arc::new(PruningProcessor::new(
            pruning_receiver,
            config.clone(),
            storage.clone(),
            traversal_service,
            sync_state,
            min_tangle_history,
            Arc::new(PruningNotifier::new()),
            shutdown.listener.clone(),
        ));

        Self { storage, config, pruning_sender, pruning_processor, shutdown }
    }

    pub fn run_processors(&self) -> Vec<JoinHandle<()>> {
        let pruning_processor = self.pruning_processor.clone();
        vec![thread::Builder::new().name("pruning-processor".to_string()).spawn(move || pruning_processor.worker()).unwrap()]
    }

    /// Hands a newly confirmed milestone to the autonomous retention policy
    pub fn notify_confirmed_milestone(&self, confirmed_index: MilestoneIndex) {
        // Fails only when the processor already exited
        let _ = self.pruning_sender.send(PruningProcessingMessage::ConfirmedMilestone(confirmed_index));
    }

    /// Queues a prune request. The returned receiver yields the pruned-to index once the request was processed.
    pub fn prune(&self, request: PruneRequest) -> CrossbeamReceiver<PruningResult<MilestoneIndex>> {
        let (response, receiver) = bounded(1);
        if !self.shutdown.is_fired() {
            let _ = self.pruning_sender.send(PruningProcessingMessage::Request { request, response });
        }
        receiver
    }

    /// Queues a prune request and waits for its result. Requests dropped on exit report an abort.
    pub fn prune_blocking(&self, request: PruneRequest) -> PruningResult<MilestoneIndex> {
        self.prune(request).recv().unwrap_or(Err(PruningError::PruningAborted))
    }

    /// Blocks until all previously queued messages were processed
    pub fn flush(&self) {
        let (done, receiver) = bounded(1);
        if !self.shutdown.is_fired() && self.pruning_sender.send(PruningProcessingMessage::Flush(done)).is_ok() {
            let _ = receiver.recv();
        }
    }

    pub fn is_pruning(&self) -> bool {
        self.pruning_processor.is_pruning()
    }

    /// The lock held while pruning. Snapshot creation must hold it as well.
    pub fn pruning_lock(&self) -> Arc<Mutex<()>> {
        self.pruning_processor.operation_lock()
    }

    pub fn notifier(&self) -> Arc<PruningNotifier> {
        self.pruning_processor.notifier()
    }

    pub fn signal_exit(&self) {
        self.shutdown.fire();
        let _ = self.pruning_sender.send(PruningProcessingMessage::Exit);
    }

    pub fn shutdown(&self, wait_handles: Vec<JoinHandle<()>>) {
        self.signal_exit();
        // Wait for the processors to exit
        for handle in wait_handles {
            handle.join().unwrap();
        }
    }
}

impl Service for Consensus {
    fn ident(self: Arc<Consensus>) -> &'static str {
        "consensus"
    }

    fn start(self: Arc<Consensus>, _core: Arc<tangle_core::core::Core>) -> Vec<JoinHandle<()>> {
        trace!("starting consensus processors");
        self.run_processors()
    }

    fn stop(self: Arc<Consensus>) {
        trace!("signaling consensus exit");
        self.signal_exit()
    }
}
