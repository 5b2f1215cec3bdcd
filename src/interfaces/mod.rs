//! Edge adapters facing the presentation layer.

pub mod workflow;
