//! Debounced probe scheduling.
//!
//! Pointer moves are coalesced until the pointer rests for the settle
//! interval; only the last coordinate is queried, and batches superseded by a
//! newer request are dropped.

mod state;
mod task;

pub use state::{Debouncer, ProbeState};
pub use task::{ProbeEvent, ProbeHandle, ProbeScheduler, ProbeSettings};
