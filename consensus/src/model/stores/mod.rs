pub mod blocks;
pub mod children;
pub mod milestones;
pub mod protocol;
pub mod snapshot;
pub mod unreferenced;
pub mod utxo;

pub use tangle_database::prelude::DB;
