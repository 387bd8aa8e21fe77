//! Nearest-facility distance queries.

use super::distance;
use crate::models::{Coordinate, GeoPoint, ProximityResult};

/// Distance reported when no facility lies within range, in meters
pub const DEFAULT_CEILING_M: f64 = 5000.0;

/// Distance from `query` to the closest valid point, rounded to whole meters.
///
/// Returns `ceiling` when the query is not finite, when `points` holds no
/// valid point, or when nothing lies strictly closer than `ceiling`. A point
/// at exactly zero distance is treated as a self-match and skipped.
pub fn nearest(query: Coordinate, points: &[GeoPoint], ceiling: f64) -> f64 {
    closest_within(query, points, ceiling).unwrap_or(ceiling)
}

/// Same as [`nearest`], tagged with the category and whether the ceiling was
/// hit.
pub fn nearest_result(
    category: &str,
    query: Coordinate,
    points: &[GeoPoint],
    ceiling: f64,
) -> ProximityResult {
    match closest_within(query, points, ceiling) {
        Some(meters) => ProximityResult::measured(category, meters),
        None => ProximityResult::ceiling(category, ceiling),
    }
}

/// Run the query once per category, in the given order.
pub fn probe<'a, I>(query: Coordinate, categories: I, ceiling: f64) -> Vec<ProximityResult>
where
    I: IntoIterator<Item = (&'a str, &'a [GeoPoint])>,
{
    categories
        .into_iter()
        .map(|(category, points)| nearest_result(category, query, points, ceiling))
        .collect()
}

fn closest_within(query: Coordinate, points: &[GeoPoint], ceiling: f64) -> Option<f64> {
    if !query.is_valid() || points.is_empty() {
        return None;
    }

    let mut best: Option<f64> = None;
    for candidate in points.iter().filter_map(GeoPoint::coordinate) {
        let d = distance(query, candidate);
        if d > 0.0 && d < best.unwrap_or(ceiling) {
            best = Some(d);
        }
    }

    best.map(f64::round)
}
