//!
//! # Tangle Consensus Core
//!
//! Shared types of the tangle node: block and milestone models, snapshot boundary state,
//! UTXO ledger records, pruning configuration and the interfaces other subsystems expose to pruning.
//!

pub mod api;
pub mod block;
pub mod config;
pub mod errors;
pub mod milestone;
pub mod notify;
pub mod snapshot;
pub mod utxo;

/// Index of a milestone. Milestone indexes are assigned in strictly increasing order.
pub type MilestoneIndex = u32;

pub use block::BlockId;
