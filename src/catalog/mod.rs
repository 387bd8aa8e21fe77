//! Dataset catalog: aggregation, snapshots and the loading session.

mod aggregator;
mod registry;
mod session;
mod snapshot;

pub use aggregator::Aggregator;
pub use registry::{Catalog, FetchToken};
pub use session::{Session, SessionHandle};
pub use snapshot::{CatalogSnapshot, CategoryPoints, DatasetPoints};
