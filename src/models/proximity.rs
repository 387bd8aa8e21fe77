//! Probe requests and the results published to the display layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;

/// Distance from the probe to the nearest facility of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityResult {
    pub category: String,

    /// `None` until the first batch has been computed
    pub distance_meters: Option<f64>,

    /// The distance is the configured ceiling, not a measured minimum
    pub is_ceiling: bool,
}

impl ProximityResult {
    pub fn measured(category: &str, meters: f64) -> Self {
        Self {
            category: category.to_string(),
            distance_meters: Some(meters),
            is_ceiling: false,
        }
    }

    pub fn ceiling(category: &str, ceiling: f64) -> Self {
        Self {
            category: category.to_string(),
            distance_meters: Some(ceiling),
            is_ceiling: true,
        }
    }

    pub fn pending(category: &str) -> Self {
        Self {
            category: category.to_string(),
            distance_meters: None,
            is_ceiling: false,
        }
    }

    /// Human-readable distance, e.g. `"420 m"` or `"≥ 5 km"`
    pub fn label(&self) -> String {
        match self.distance_meters {
            None => "—".to_string(),
            Some(m) if self.is_ceiling => format!("≥ {}", format_ceiling(m)),
            Some(m) => format!("{} m", m.round()),
        }
    }
}

/// Whole kilometres read as km; measured distances always stay in meters
fn format_ceiling(m: f64) -> String {
    if m >= 1000.0 && m % 1000.0 == 0.0 {
        format!("{} km", m / 1000.0)
    } else {
        format!("{} m", m.round())
    }
}

/// A pointer position accepted by the probe scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub request_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProbeRequest {
    pub fn new(request_id: u64, at: Coordinate) -> Self {
        Self {
            latitude: at.lat,
            longitude: at.lng,
            request_id,
            timestamp: Utc::now(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// All category results computed for one probe request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeBatch {
    pub request_id: u64,
    pub origin: Coordinate,
    pub results: Vec<ProximityResult>,
    pub computed_at: DateTime<Utc>,
}

impl ProbeBatch {
    pub fn result(&self, category: &str) -> Option<&ProximityResult> {
        self.results.iter().find(|r| r.category == category)
    }
}

/// What a probe subscriber sees
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeView {
    /// Probe panel should be shown
    pub visible: bool,

    /// Datasets are still loading; distances are not available yet
    pub loading: bool,

    /// Last published batch, kept across pointer-leave
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<ProbeBatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(ProximityResult::pending("school").label(), "—");
        assert_eq!(ProximityResult::measured("school", 420.0).label(), "420 m");
        assert_eq!(ProximityResult::measured("school", 2000.0).label(), "2000 m");
        assert_eq!(ProximityResult::measured("school", 1999.0).label(), "1999 m");
        assert_eq!(ProximityResult::ceiling("school", 5000.0).label(), "≥ 5 km");
        assert_eq!(ProximityResult::ceiling("school", 2500.0).label(), "≥ 2500 m");
    }

    #[test]
    fn test_batch_lookup() {
        let batch = ProbeBatch {
            request_id: 3,
            origin: Coordinate::new(-22.9, -43.2),
            results: vec![
                ProximityResult::measured("school", 120.0),
                ProximityResult::ceiling("hospital", 5000.0),
            ],
            computed_at: Utc::now(),
        };
        assert_eq!(batch.result("hospital").map(|r| r.is_ceiling), Some(true));
        assert!(batch.result("park").is_none());
    }
}
