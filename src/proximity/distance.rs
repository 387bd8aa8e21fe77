//! Great-circle distance.

use crate::models::Coordinate;

/// Earth radius used by the haversine formula, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[(f64, f64)] = &[
        (-22.909427, -43.182134),
        (-22.9, -43.4),
        (-22.91, -43.41),
        (0.0, 0.0),
        (51.5074, -0.1278),
        (-33.8688, 151.2093),
        (89.9, 179.9),
    ];

    #[test]
    fn test_symmetric_and_zero_on_self() {
        for &(lat1, lng1) in SAMPLES {
            let a = Coordinate::new(lat1, lng1);
            assert_eq!(distance(a, a), 0.0);
            for &(lat2, lng2) in SAMPLES {
                let b = Coordinate::new(lat2, lng2);
                assert_eq!(distance(a, b), distance(b, a));
            }
        }
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 2 * pi * R / 360
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_monotonic_with_separation() {
        let origin = Coordinate::new(-22.9, -43.2);
        let mut last = 0.0;
        for step in 1..20 {
            let d = distance(origin, Coordinate::new(-22.9 + step as f64 * 0.01, -43.2));
            assert!(d > last);
            last = d;
        }
    }
}
