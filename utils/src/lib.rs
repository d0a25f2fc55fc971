//!
//! # Tangle Utilities
//!
//! General purpose utilities shared across the tangle node crates.
//!

pub mod bytes;
pub mod triggers;
