//! Free-text address lookup

mod nominatim;

pub use nominatim::{parse_first_hit, GeocodeHit, Geocoder};
