pub mod pruning;
pub mod sync;
pub mod traversal_manager;
