// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parcels, parcel sets and resolved land units.

use std::hash::{Hash, Hasher};

use cadmap_port::{BoundingBox, LngLat, RenderedFeature};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::Zoning;

/// Tile property holding the cadastral section.
pub const PROP_SECTION: &str = "section";
/// Tile property holding the parcel number.
pub const PROP_NUMBER: &str = "numero";
/// Tile property holding the municipality (INSEE) code.
pub const PROP_MUNICIPALITY: &str = "commune";

/// One selectable cadastral parcel.
///
/// Identity is `(section, number)`; the municipality code and geometry are
/// payload. Fields keep the values the tiles carry (trimmed only), since
/// filters and API paths must match the data. Identity compares sections
/// case-insensitively and numbers without leading zeros, so `("ac", "0012")`
/// and `("AC", "12")` are the same parcel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelRef {
    /// Cadastral section.
    pub section: String,
    /// Parcel number within the section.
    pub number: String,
    /// Municipality code; empty when unknown.
    pub municipality_code: String,
    /// GeoJSON geometry, when known.
    pub geometry: Option<Value>,
}

impl ParcelRef {
    /// Construct a parcel without geometry.
    pub fn new(section: &str, number: &str, municipality_code: &str) -> Self {
        Self {
            section: section.trim().to_owned(),
            number: number.trim().to_owned(),
            municipality_code: municipality_code.trim().to_owned(),
            geometry: None,
        }
    }

    /// Attach a geometry.
    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Read a parcel from a rendered feature's properties.
    pub fn from_feature(feature: &RenderedFeature) -> Option<Self> {
        let section = feature.property_str(PROP_SECTION)?;
        let number = feature.property_str(PROP_NUMBER)?;
        if section.trim().is_empty() || number.trim().is_empty() {
            return None;
        }
        let code = feature.property_str(PROP_MUNICIPALITY).unwrap_or_default();
        let mut parcel = Self::new(&section, &number, &code);
        parcel.geometry = feature.geometry.clone();
        Some(parcel)
    }

    /// True when the parcel carries a non-empty municipality code.
    pub fn has_municipality(&self) -> bool {
        !self.municipality_code.is_empty()
    }

    /// Normalized `(section, number)` used for identity.
    pub fn identity(&self) -> (String, String) {
        (self.section.to_uppercase(), normalize_number(&self.number))
    }

    /// Same `(section, number)` as `other`.
    pub fn same_parcel(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl PartialEq for ParcelRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_parcel(other)
    }
}

impl Eq for ParcelRef {}

impl Hash for ParcelRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('0');
    if trimmed.is_empty() && !raw.trim().is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Click-ordered set of parcels, deduplicated by `(section, number)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParcelSet {
    parcels: Vec<ParcelRef>,
}

impl ParcelSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the parcel is in the set.
    pub fn contains(&self, parcel: &ParcelRef) -> bool {
        self.parcels.iter().any(|p| p.same_parcel(parcel))
    }

    /// Add a parcel. Returns false if it was already present.
    pub fn insert(&mut self, parcel: ParcelRef) -> bool {
        if self.contains(&parcel) {
            return false;
        }
        self.parcels.push(parcel);
        true
    }

    /// Remove a parcel. Returns false if it was absent.
    pub fn remove(&mut self, parcel: &ParcelRef) -> bool {
        let before = self.parcels.len();
        self.parcels.retain(|p| !p.same_parcel(parcel));
        self.parcels.len() != before
    }

    /// Number of parcels.
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Parcels in click order.
    pub fn iter(&self) -> impl Iterator<Item = &ParcelRef> {
        self.parcels.iter()
    }

    /// Parcels in click order.
    pub fn as_slice(&self) -> &[ParcelRef] {
        &self.parcels
    }
}

impl FromIterator<ParcelRef> for ParcelSet {
    fn from_iter<I: IntoIterator<Item = ParcelRef>>(iter: I) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ParcelSet {
    type Item = &'a ParcelRef;
    type IntoIter = std::slice::Iter<'a, ParcelRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.parcels.iter()
    }
}

/// A server-confirmed land unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialUnit {
    /// Member parcels, in click order.
    pub parcels: Vec<ParcelRef>,
    /// GeoJSON geometry of the union.
    pub union_geometry: Value,
    /// Municipality code shared by every parcel.
    pub municipality_code: String,
    /// Municipality name, when the server returned one.
    pub municipality_name: Option<String>,
    /// User-given name.
    pub name: Option<String>,
    /// Zoning per parcel (same order as `parcels`), filled after resolution.
    pub zoning: Vec<Option<Zoning>>,
}

impl SpatialUnit {
    /// Bounding box of the union geometry.
    pub fn bounds(&self) -> Option<BoundingBox> {
        geometry_bounds(&self.union_geometry)
    }
}

/// Bounding box of a GeoJSON geometry (any type, collections included).
pub fn geometry_bounds(geometry: &Value) -> Option<BoundingBox> {
    let mut points = Vec::new();
    if let Some(children) = geometry.get("geometries").and_then(Value::as_array) {
        for child in children {
            if let Some(bb) = geometry_bounds(child) {
                points.push(bb.min);
                points.push(bb.max);
            }
        }
    } else if let Some(coords) = geometry.get("coordinates") {
        collect_positions(coords, &mut points);
    }
    BoundingBox::around(points)
}

fn collect_positions(value: &Value, out: &mut Vec<LngLat>) {
    let Some(items) = value.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(lng), Some(lat)) => out.push(LngLat::new(lng, lat)),
        _ => {
            for item in items {
                collect_positions(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_ignores_case_padding_and_municipality() {
        let a = ParcelRef::new("ac", "0012", "33063");
        let b = ParcelRef::new("AC", "12", "");
        assert_eq!(a, b);
        assert_ne!(a, ParcelRef::new("AC", "120", "33063"));
        assert_eq!(ParcelRef::new("AB", "000", "").identity().1, "0");
        assert_eq!(ParcelRef::new("AB", "0", "").identity(), ParcelRef::new("ab", "00", "").identity());
    }

    #[test]
    fn fields_keep_the_tile_values() {
        let p = ParcelRef::new(" ac ", "0012", "33063");
        assert_eq!((p.section.as_str(), p.number.as_str()), ("ac", "0012"));
        assert_eq!(p.identity(), ("AC".to_owned(), "12".to_owned()));
    }

    #[test]
    fn set_dedups_and_keeps_click_order() {
        let mut set = ParcelSet::new();
        assert!(set.insert(ParcelRef::new("AC", "45", "33063")));
        assert!(set.insert(ParcelRef::new("AC", "12", "33063")));
        assert!(!set.insert(ParcelRef::new("AC", "045", "33063")));
        let numbers: Vec<_> = set.iter().map(|p| p.number.as_str()).collect();
        // The first click's spelling is kept.
        assert_eq!(numbers, vec!["45", "12"]);
        assert!(set.remove(&ParcelRef::new("AC", "45", "")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parcel_from_feature_reads_numeric_numbers() {
        let feature = RenderedFeature {
            key: None,
            style: "parcelles-fill".into(),
            properties: json!({"section": "AC", "numero": 12, "commune": "33063"})
                .as_object()
                .cloned()
                .unwrap(),
            geometry: None,
        };
        let p = ParcelRef::from_feature(&feature).unwrap();
        assert_eq!((p.section.as_str(), p.number.as_str()), ("AC", "12"));
        assert_eq!(p.municipality_code, "33063");
    }

    #[test]
    fn bounds_walk_nested_polygons() {
        let geom = json!({
            "type": "MultiPolygon",
            "coordinates": [[[[-0.58, 44.84], [-0.57, 44.84], [-0.57, 44.85], [-0.58, 44.84]]],
                            [[[-0.60, 44.83], [-0.59, 44.83], [-0.60, 44.83]]]]
        });
        let bb = geometry_bounds(&geom).unwrap();
        assert_eq!(bb.min, LngLat::new(-0.60, 44.83));
        assert_eq!(bb.max, LngLat::new(-0.57, 44.85));
        assert!(geometry_bounds(&json!({"type": "Point"})).is_none());
    }
}
