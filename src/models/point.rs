//! Normalized facility points and query coordinates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query coordinate (lat/lng in degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite numbers
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<Coordinate> for geo::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Point::new(c.lng, c.lat)
    }
}

/// A facility normalized out of a raw source record.
///
/// Missing or unparseable coordinates are `None`, never `0.0`: zero is a real
/// location. Attributes are display metadata and play no part in distance
/// computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub attributes: HashMap<String, String>,
}

impl GeoPoint {
    /// Create a point with known coordinates and no attributes
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            attributes: HashMap::new(),
        }
    }

    /// The point's coordinate, if both components are present and finite
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                let c = Coordinate::new(lat, lng);
                c.is_valid().then_some(c)
            }
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.coordinate().is_some()
    }

    /// Look up a display attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
