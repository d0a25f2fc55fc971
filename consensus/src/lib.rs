//!
//! # Tangle Consensus
//!
//! Storage of the tangle and the UTXO ledger together with the machinery which keeps the database
//! bounded: DAG traversal, solid entry point computation, target index calculation and the pruning
//! processor which deletes milestone cones below the retention boundary.
//!
//! ## Retention boundary
//!
//! The boundary is persisted as [`SnapshotInfo`](tangle_consensus_core::snapshot::SnapshotInfo):
//!
//! - `pruning_index`: every milestone at or below it, together with its cone, ledger diff and
//!   receipts, is deleted.
//! - `entry_point_index`: the index the stored solid entry points were computed for. It never lags
//!   `pruning_index`, so any retained block resolves each parent to either a stored block or a
//!   solid entry point.
//!

pub mod consensus;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod processes;
pub mod test_helpers;
