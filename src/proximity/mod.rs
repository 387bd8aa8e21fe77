//! Distance computation and nearest-facility queries.

mod distance;
mod nearest;

pub use distance::{distance, EARTH_RADIUS_M};
pub use nearest::{nearest, nearest_result, probe, DEFAULT_CEILING_M};
