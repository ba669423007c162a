//! Aggregator selection strategies.
pub mod simple;
