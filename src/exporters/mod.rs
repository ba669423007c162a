//! Built-in exporters for checkpointed metric data.
pub mod stdout;
