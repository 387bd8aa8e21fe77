//! Persistent dataset cache and the gate consulted before any fetch.

mod gate;
mod store;

pub use gate::CacheGate;
pub use store::{CacheError, DatasetCache};

#[cfg(test)]
pub(crate) use gate::tests::{record, FakeSource};
