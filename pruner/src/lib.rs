pub mod args;
pub mod daemon;
pub mod errors;
pub mod job;
