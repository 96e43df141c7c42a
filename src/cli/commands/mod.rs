//! Command implementations.

pub mod migrate;
pub mod queue;
pub mod version;
