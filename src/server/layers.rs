//! Map layer payloads: point features and heatmap triples.

use geo::{coord, Intersects, Rect};
use serde::Serialize;
use std::collections::HashMap;

use proxmap::models::GeoPoint;

/// Point feature in GeoJSON-like format
#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: &'static str,
    pub geometry: Geometry,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub geo_type: &'static str,
    /// `[lng, lat]`
    pub coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: &'static str,
    pub features: Vec<Feature>,
}

/// Parse bbox string "minLon,minLat,maxLon,maxLat"
pub fn parse_bbox(bbox: &Option<String>) -> Option<Rect<f64>> {
    bbox.as_ref().and_then(|s| {
        let parts: Vec<f64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
        if parts.len() == 4 && parts.iter().all(|p| p.is_finite()) {
            Some(Rect::new(
                coord! { x: parts[0], y: parts[1] },
                coord! { x: parts[2], y: parts[3] },
            ))
        } else {
            None
        }
    })
}

/// Valid points as features, optionally clipped to `bbox` (edges included)
pub fn features<'a, I>(points: I, bbox: Option<Rect<f64>>) -> FeatureCollection
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    let features = points
        .into_iter()
        .filter_map(|p| p.coordinate().map(|c| (p, c)))
        .filter(|(_, c)| bbox.map_or(true, |b| b.intersects(&geo::Point::from(*c))))
        .map(|(p, c)| Feature {
            feature_type: "Feature",
            geometry: Geometry {
                geo_type: "Point",
                coordinates: [c.lng, c.lat],
            },
            properties: p.attributes.clone(),
        })
        .collect();

    FeatureCollection {
        collection_type: "FeatureCollection",
        features,
    }
}

/// `[lat, lng, weight]` for every valid point
pub fn heat_points<'a, I>(points: I, weight: f64) -> Vec<[f64; 3]>
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    points
        .into_iter()
        .filter_map(GeoPoint::coordinate)
        .map(|c| [c.lat, c.lng, weight])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<GeoPoint> {
        let mut named = GeoPoint::at(-22.90, -43.40);
        named
            .attributes
            .insert("nome".to_string(), "Praça XV".to_string());
        vec![
            named,
            GeoPoint::at(-23.50, -46.60),
            GeoPoint {
                latitude: None,
                longitude: Some(-43.0),
                ..GeoPoint::default()
            },
        ]
    }

    #[test]
    fn test_parse_bbox() {
        let rect = parse_bbox(&Some("-43.8, -23.1, -43.1, -22.7".to_string())).unwrap();
        assert_eq!(rect.min().x, -43.8);
        assert_eq!(rect.max().y, -22.7);
        assert!(parse_bbox(&Some("1,2,3".to_string())).is_none());
        assert!(parse_bbox(&None).is_none());
    }

    #[test]
    fn test_features_skip_invalid_and_clip() {
        let points = points();
        let all = features(&points, None);
        assert_eq!(all.features.len(), 2);
        assert_eq!(all.features[0].geometry.coordinates, [-43.40, -22.90]);
        assert_eq!(all.features[0].properties["nome"], "Praça XV");

        let rio = parse_bbox(&Some("-43.8,-23.1,-43.1,-22.7".to_string()));
        let clipped = features(&points, rio);
        assert_eq!(clipped.features.len(), 1);
    }

    #[test]
    fn test_heat_points() {
        let heat = heat_points(&points(), 0.5);
        assert_eq!(heat, vec![[-22.90, -43.40, 0.5], [-23.50, -46.60, 0.5]]);
    }
}
