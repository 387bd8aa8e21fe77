//! Proxmap - nearest-facility distances for an interactive map
//!
//! This library provides the dataset pipeline, proximity engine and probe
//! scheduler shared by the server and warm binaries.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod geocode;
pub mod models;
pub mod normalize;
pub mod proximity;
pub mod scheduler;
pub mod source;

pub use catalog::{Catalog, CatalogSnapshot, Session, SessionHandle};
pub use config::Config;
pub use models::{Coordinate, GeoPoint, ProbeBatch, ProbeView, ProximityResult};
pub use scheduler::{ProbeHandle, ProbeScheduler, ProbeSettings};
