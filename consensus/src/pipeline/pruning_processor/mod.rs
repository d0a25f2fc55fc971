pub mod notifier;
pub mod processor;
