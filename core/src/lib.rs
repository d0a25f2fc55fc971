//!
//! # Tangle Core
//!
//! Process level plumbing shared by the tangle node binaries: the [`log`] setup with
//! its logging macros, the [`core::Core`] service runner and the ctrl-c [`signals::Signals`] handler.
//!

extern crate self as tangle_core;

pub mod core;
pub mod log;
pub mod service;
pub mod signals;

#[doc(hidden)]
pub use ::log as __log;
