//! Generic record normalization driven by a [`FieldMapping`].

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::FieldMapping;
use crate::models::{GeoPoint, RawRecord};

/// Normalize every record of a dataset, preserving order.
pub fn normalize_records(records: &[RawRecord], mapping: &FieldMapping) -> Vec<GeoPoint> {
    records
        .iter()
        .map(|record| normalize_record(record, mapping))
        .collect()
}

/// Normalize a single raw record.
///
/// Never fails: malformed coordinates become `None` and validity is left to
/// consumers.
pub fn normalize_record(record: &RawRecord, mapping: &FieldMapping) -> GeoPoint {
    let mut consumed: HashSet<&str> = HashSet::new();
    let mut attributes = HashMap::new();

    let latitude = select(record, &mapping.latitude).and_then(|(key, value)| {
        consumed.insert(key);
        parse_coordinate(value)
    });
    let longitude = select(record, &mapping.longitude).and_then(|(key, value)| {
        consumed.insert(key);
        parse_coordinate(value)
    });

    for (target, candidates) in &mapping.attributes {
        if let Some((key, value)) = select(record, candidates) {
            if let Some(text) = value_to_string(value) {
                consumed.insert(key);
                attributes.insert(target.clone(), text);
            }
        }
    }

    // Unmapped fields are kept for display under their raw key
    for (key, value) in record {
        if consumed.contains(key.as_str()) || attributes.contains_key(key) {
            continue;
        }
        if let Some(text) = value_to_string(value) {
            attributes.insert(key.clone(), text);
        }
    }

    GeoPoint {
        latitude,
        longitude,
        attributes,
    }
}

/// Parse a coordinate from a JSON number or numeric string.
///
/// Strings are trimmed and may use a comma as decimal separator when no dot is
/// present (`"-22,90"`). Non-finite results are rejected.
pub fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.contains(',') && !s.contains('.') {
                s.replacen(',', ".", 1).parse::<f64>().ok()
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

/// First candidate key holding a present, non-empty value
fn select<'a>(record: &'a RawRecord, candidates: &[String]) -> Option<(&'a str, &'a Value)> {
    candidates.iter().find_map(|candidate| {
        let (key, value) = record.get_key_value(candidate.as_str())?;
        if is_blank(value) {
            None
        } else {
            Some((key.as_str(), value))
        }
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
