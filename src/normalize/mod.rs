//! Point normalization: heterogeneous source records to [`GeoPoint`]s.
//!
//! [`GeoPoint`]: crate::models::GeoPoint

mod mapping;
mod normalizer;

pub use mapping::FieldMapping;
pub use normalizer::{normalize_record, normalize_records, parse_coordinate};
