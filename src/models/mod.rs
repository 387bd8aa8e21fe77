//! Core data models for the proximity engine.

pub mod dataset;
pub mod point;
pub mod proximity;

pub use dataset::{Dataset, RawRecord};
pub use point::{Coordinate, GeoPoint};
pub use proximity::{ProbeBatch, ProbeRequest, ProbeView, ProximityResult};
