// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parcel, feature and catalog builders.

use cadmap_engine::{CatalogEntry, ParcelRef, PARCEL_LAYER_ID};
use cadmap_port::{FeatureKey, RenderedFeature};
use serde_json::{json, Map, Value};

/// Parcel without geometry.
pub fn parcel(section: &str, number: &str, municipality_code: &str) -> ParcelRef {
    ParcelRef::new(section, number, municipality_code)
}

/// Closed square polygon of side `size` degrees with its south-west corner at `(lng, lat)`.
pub fn square(lng: f64, lat: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lng, lat],
            [lng + size, lat],
            [lng + size, lat + size],
            [lng, lat + size],
            [lng, lat]
        ]]
    })
}

/// Parcel feature as drawn by the parcel layer's fill style.
pub fn parcel_feature(id: u64, section: &str, number: &str, municipality_code: &str) -> RenderedFeature {
    let mut properties = Map::new();
    properties.insert("section".into(), json!(section));
    properties.insert("numero".into(), json!(number));
    properties.insert("commune".into(), json!(municipality_code));
    RenderedFeature {
        key: Some(FeatureKey::new(PARCEL_LAYER_ID, PARCEL_LAYER_ID, id)),
        style: format!("{PARCEL_LAYER_ID}-fill"),
        properties,
        geometry: Some(square(-0.58, 44.84, 0.001)),
    }
}

/// Feature of `layer`'s primary style carrying `attribute = value`.
pub fn category_feature(style: &str, attribute: &str, value: &str, id: u64) -> RenderedFeature {
    let layer = style.rsplit_once('-').map_or(style, |(layer, _)| layer);
    let mut properties = Map::new();
    properties.insert(attribute.into(), json!(value));
    RenderedFeature {
        key: Some(FeatureKey::new(layer, layer, id)),
        style: style.into(),
        properties,
        geometry: None,
    }
}

/// Catalog entry as served by `GET /layers`.
pub fn catalog_entry(id: &str, kind: &str, minzoom: u8, maxzoom: u8) -> CatalogEntry {
    CatalogEntry {
        id: id.into(),
        nom: id.replace('_', " "),
        kind: kind.into(),
        attribut_map: None,
        minzoom: f64::from(minzoom),
        maxzoom: f64::from(maxzoom),
    }
}
