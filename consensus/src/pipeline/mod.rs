pub mod pruning_processor;
