// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static catalog of thematic layer descriptors.
//!
//! The registry is built once (from the builtin table or from the remote
//! `/layers` catalog) and never mutated afterwards. Everything the scheduler
//! needs to attach a layer, the source definition and the derived style
//! layers, is a pure function of its descriptor.

use cadmap_port::{Color, SourceDef, StyleKind, StyleLayerDef, FEATURE_STATE_HOVER};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::style_cache::palette_color;

/// Highest zoom level a layer may declare.
pub const MAX_ZOOM: u8 = 24;

/// Stroke color of the selection-highlight style.
pub const SELECTION_COLOR: Color = Color::rgb(0xff, 0xc8, 0x00);

const DEFAULT_OUTLINE: Color = Color::rgb(0x4a, 0x4a, 0x4a);

/// Geometry drawn by a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// Polygons.
    Fill,
    /// Lines.
    Line,
    /// Points.
    Point,
}

impl GeometryKind {
    /// Map a catalog `type` string onto a geometry kind.
    pub fn from_catalog_type(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "fill" | "polygon" => Some(Self::Fill),
            "line" => Some(Self::Line),
            "circle" | "symbol" | "point" => Some(Self::Point),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::Line => "line",
            Self::Point => "point",
        }
    }

    fn style_kind(self) -> StyleKind {
        match self {
            Self::Fill => StyleKind::Fill,
            Self::Line => StyleKind::Line,
            Self::Point => StyleKind::Circle,
        }
    }

    /// Paint property holding the main color of the primary style.
    pub fn color_property(self) -> &'static str {
        match self {
            Self::Fill => "fill-color",
            Self::Line => "line-color",
            Self::Point => "circle-color",
        }
    }
}

/// Immutable description of one thematic layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Layer id; also the source id and the source-layer name inside tiles.
    pub id: String,
    /// Human label.
    pub label: String,
    /// Lowest integer zoom at which the layer is shown.
    pub zoom_min: u8,
    /// Highest integer zoom at which the layer is shown.
    pub zoom_max: u8,
    /// Tile URL template with `{z}/{x}/{y}` placeholders.
    pub tile_template: String,
    /// Geometry drawn by the layer.
    pub geometry: GeometryKind,
    /// Feature property used for categorical coloring.
    pub category_attribute: Option<String>,
    /// Color used when no categorical style applies.
    pub base_color: Color,
    /// Outline/stroke color.
    pub outline_color: Color,
    /// Whether parcels of this layer can be selected (adds a highlight style).
    pub selectable: bool,
}

impl LayerDescriptor {
    /// True when `zoom` lies inside `[zoom_min, zoom_max]`.
    pub fn in_range(&self, zoom: u8) -> bool {
        (self.zoom_min..=self.zoom_max).contains(&zoom)
    }

    /// Id of the style layer that carries the main color and receives pointer events.
    pub fn primary_style_id(&self) -> String {
        format!("{}-{}", self.id, self.geometry.suffix())
    }

    /// Id of the selection-highlight style, when the layer is selectable.
    pub fn selection_style_id(&self) -> Option<String> {
        self.selectable.then(|| format!("{}-selected", self.id))
    }

    /// All derived style ids, in the order they are added to the surface.
    pub fn style_ids(&self) -> Vec<String> {
        self.style_defs().into_iter().map(|s| s.id).collect()
    }

    /// Expand the tile template for one tile.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.tile_template
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    /// Source registration for the draw surface.
    pub fn source_def(&self) -> SourceDef {
        SourceDef {
            id: self.id.clone(),
            tiles: self.tile_template.clone(),
            min_zoom: self.zoom_min,
            max_zoom: self.zoom_max,
        }
    }

    /// Style layers derived from this descriptor.
    pub fn style_defs(&self) -> Vec<StyleLayerDef> {
        let hovered = json!(["boolean", ["feature-state", FEATURE_STATE_HOVER], false]);
        let mut styles = Vec::with_capacity(3);
        let mut primary = self.style(self.primary_style_id(), self.geometry.style_kind());
        primary.paint.insert(
            self.geometry.color_property().into(),
            json!(self.base_color.to_hex()),
        );
        match self.geometry {
            GeometryKind::Fill => {
                primary
                    .paint
                    .insert("fill-opacity".into(), json!(["case", hovered, 0.75, 0.45]));
                styles.push(primary);
                let mut outline = self.style(format!("{}-outline", self.id), StyleKind::Line);
                outline
                    .paint
                    .insert("line-color".into(), json!(self.outline_color.to_hex()));
                outline.paint.insert("line-width".into(), json!(1));
                styles.push(outline);
            }
            GeometryKind::Line => {
                primary
                    .paint
                    .insert("line-width".into(), json!(["case", hovered, 4, 2]));
                styles.push(primary);
            }
            GeometryKind::Point => {
                primary
                    .paint
                    .insert("circle-radius".into(), json!(["case", hovered, 7, 5]));
                primary.paint.insert(
                    "circle-stroke-color".into(),
                    json!(self.outline_color.to_hex()),
                );
                styles.push(primary);
            }
        }
        if let Some(id) = self.selection_style_id() {
            let mut selected = self.style(id, StyleKind::Line);
            selected
                .paint
                .insert("line-color".into(), json!(SELECTION_COLOR.to_hex()));
            selected.paint.insert("line-width".into(), json!(3));
            selected.filter = Some(json!(["any"]));
            styles.push(selected);
        }
        styles
    }

    fn style(&self, id: String, kind: StyleKind) -> StyleLayerDef {
        StyleLayerDef {
            id,
            source: self.id.clone(),
            source_layer: self.id.clone(),
            kind,
            paint: Map::new(),
            filter: None,
            visible: true,
        }
    }
}

/// One entry of the remote `/layers` catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Layer id.
    pub id: String,
    /// Human label.
    pub nom: String,
    /// Geometry type (`fill`, `line`, `circle`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Property used for categorical coloring.
    #[serde(default)]
    pub attribut_map: Option<String>,
    /// Lowest zoom; fractional values are allowed.
    pub minzoom: f64,
    /// Highest zoom; fractional values are allowed.
    pub maxzoom: f64,
}

/// Decode catalog entries one by one, skipping malformed ones.
pub fn parse_catalog(raw: Vec<Value>) -> Vec<CatalogEntry> {
    raw.into_iter()
        .filter_map(|value| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_owned();
            match serde_json::from_value::<CatalogEntry>(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(layer = %id, error = %err, "skipping malformed catalog entry");
                    None
                }
            }
        })
        .collect()
}

/// Integer zoom window covering `[min, max]`, or `None` when invalid.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn zoom_window(min: f64, max: f64) -> Option<(u8, u8)> {
    if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
        return None;
    }
    let (lo, hi) = (min.floor(), max.ceil());
    if hi > f64::from(MAX_ZOOM) {
        return None;
    }
    Some((lo as u8, hi as u8))
}

struct BuiltinLayer {
    id: &'static str,
    label: &'static str,
    zoom: (u8, u8),
    geometry: GeometryKind,
    category: Option<&'static str>,
    base: Color,
    outline: Color,
    selectable: bool,
}

/// Id of the cadastral parcel layer in the builtin catalog.
pub const PARCEL_LAYER_ID: &str = "parcelles";

const BUILTIN: &[BuiltinLayer] = &[
    BuiltinLayer {
        id: PARCEL_LAYER_ID,
        label: "Parcelles cadastrales",
        zoom: (14, 19),
        geometry: GeometryKind::Fill,
        category: None,
        base: Color::rgb(0xf5, 0xf0, 0xe6),
        outline: Color::rgb(0x8c, 0x6d, 0x46),
        selectable: true,
    },
    BuiltinLayer {
        id: "zonage_plu",
        label: "Zonage PLU",
        zoom: (11, 19),
        geometry: GeometryKind::Fill,
        category: Some("typezone"),
        base: Color::rgb(0xd9, 0xd9, 0xd9),
        outline: DEFAULT_OUTLINE,
        selectable: false,
    },
    BuiltinLayer {
        id: "batiments",
        label: "Bâtiments",
        zoom: (15, 19),
        geometry: GeometryKind::Fill,
        category: None,
        base: Color::rgb(0xb0, 0xa8, 0x9f),
        outline: DEFAULT_OUTLINE,
        selectable: false,
    },
    BuiltinLayer {
        id: "servitudes",
        label: "Servitudes d'utilité publique",
        zoom: (12, 19),
        geometry: GeometryKind::Line,
        category: Some("categorie"),
        base: Color::rgb(0x6a, 0x3d, 0x9a),
        outline: DEFAULT_OUTLINE,
        selectable: false,
    },
    BuiltinLayer {
        id: "risques_inondation",
        label: "Risque inondation",
        zoom: (10, 17),
        geometry: GeometryKind::Fill,
        category: Some("niveau"),
        base: Color::rgb(0x1f, 0x78, 0xb4),
        outline: DEFAULT_OUTLINE,
        selectable: false,
    },
    BuiltinLayer {
        id: "monuments_historiques",
        label: "Monuments historiques",
        zoom: (12, 19),
        geometry: GeometryKind::Point,
        category: None,
        base: Color::rgb(0xe3, 0x1a, 0x1c),
        outline: Color::rgb(0xff, 0xff, 0xff),
        selectable: false,
    },
];

fn tile_template(base: &str, id: &str) -> String {
    format!("{}/tiles/{id}/{{z}}/{{x}}/{{y}}.mvt", base.trim_end_matches('/'))
}

/// Read-only lookup table of layer descriptors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerRegistry {
    layers: Vec<LayerDescriptor>,
}

impl LayerRegistry {
    /// Build a registry from descriptors. Later duplicates of an id are dropped.
    pub fn new(layers: impl IntoIterator<Item = LayerDescriptor>) -> Self {
        let mut out: Vec<LayerDescriptor> = Vec::new();
        for layer in layers {
            if out.iter().any(|l| l.id == layer.id) {
                warn!(layer = %layer.id, "duplicate layer id; keeping first");
                continue;
            }
            out.push(layer);
        }
        Self { layers: out }
    }

    /// The builtin thematic layers, served under `base`.
    pub fn builtin(base: &str) -> Self {
        Self::new(BUILTIN.iter().map(|b| LayerDescriptor {
            id: b.id.into(),
            label: b.label.into(),
            zoom_min: b.zoom.0,
            zoom_max: b.zoom.1,
            tile_template: tile_template(base, b.id),
            geometry: b.geometry,
            category_attribute: b.category.map(Into::into),
            base_color: b.base,
            outline_color: b.outline,
            selectable: b.selectable,
        }))
    }

    /// Build a registry from the remote catalog.
    ///
    /// Entries with an unknown geometry type or an inverted zoom window are
    /// skipped. `parcel_layer` names the layer whose features are selectable.
    pub fn from_catalog(base: &str, entries: &[CatalogEntry], parcel_layer: &str) -> Self {
        let layers = entries.iter().filter_map(|entry| {
            let Some(geometry) = GeometryKind::from_catalog_type(&entry.kind) else {
                warn!(layer = %entry.id, kind = %entry.kind, "skipping layer with unknown type");
                return None;
            };
            let Some((zoom_min, zoom_max)) = zoom_window(entry.minzoom, entry.maxzoom) else {
                warn!(
                    layer = %entry.id,
                    minzoom = entry.minzoom,
                    maxzoom = entry.maxzoom,
                    "skipping layer with invalid zoom window"
                );
                return None;
            };
            Some(LayerDescriptor {
                id: entry.id.clone(),
                label: entry.nom.clone(),
                zoom_min,
                zoom_max,
                tile_template: tile_template(base, &entry.id),
                geometry,
                category_attribute: entry
                    .attribut_map
                    .clone()
                    .filter(|a| !a.trim().is_empty()),
                base_color: palette_color(&entry.id),
                outline_color: DEFAULT_OUTLINE,
                selectable: entry.id == parcel_layer,
            })
        });
        Self::new(layers)
    }

    /// Every descriptor, in catalog order.
    pub fn all(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    /// Look a descriptor up by id.
    pub fn by_id(&self, id: &str) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when the registry has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    fn entry(id: &str, kind: &str, min: u8, max: u8) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            nom: id.to_uppercase(),
            kind: kind.into(),
            attribut_map: None,
            minzoom: f64::from(min),
            maxzoom: f64::from(max),
        }
    }

    #[test]
    fn builtin_lookup_and_templates() {
        let reg = LayerRegistry::builtin("https://carto.example/api/");
        let parcels = reg.by_id(PARCEL_LAYER_ID).unwrap();
        assert!(parcels.selectable);
        assert_eq!(
            parcels.tile_url(16, 32_512, 23_011),
            "https://carto.example/api/tiles/parcelles/16/32512/23011.mvt"
        );
        assert!(reg.by_id("nope").is_none());
    }

    #[test]
    fn catalog_maps_types_and_skips_invalid_entries() {
        let mut zoning = entry("zonage", "fill", 11, 19);
        zoning.attribut_map = Some("typezone".into());
        let entries = vec![
            zoning,
            entry("reseau", "line", 12, 18),
            entry("arbres", "circle", 15, 19),
            entry("raster", "raster", 0, 19),
            entry("inverse", "fill", 16, 12),
            entry("zonage", "line", 0, 5),
        ];
        let reg = LayerRegistry::from_catalog("http://h", &entries, "parcelles");
        let ids: Vec<_> = reg.all().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["zonage", "reseau", "arbres"]);
        let zoning = reg.by_id("zonage").unwrap();
        assert_eq!(zoning.geometry, GeometryKind::Fill);
        assert_eq!(zoning.category_attribute.as_deref(), Some("typezone"));
        assert_eq!(reg.by_id("arbres").unwrap().geometry, GeometryKind::Point);
    }

    #[test]
    fn catalog_json_shape_parses() {
        let raw = r#"[{"id":"zonage","nom":"Zonage","type":"fill","attribut_map":"typezone","minzoom":11,"maxzoom":19},
                     {"id":"reseau","nom":"Réseau","type":"line","minzoom":12,"maxzoom":18}]"#;
        let entries: Vec<CatalogEntry> = serde_json::from_str(raw).unwrap();
        assert_eq!(entries[1].attribut_map, None);
        assert!((entries[0].minzoom - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mixed_catalog_keeps_its_valid_entries() {
        let raw: Vec<Value> = serde_json::from_str(
            r#"[{"id":"zonage","nom":"Zonage","type":"fill","minzoom":11,"maxzoom":19},
                {"id":"pentes","nom":"Pentes","type":"fill","minzoom":15.5,"maxzoom":18.2},
                {"id":"hors","nom":"Hors","type":"fill","minzoom":3,"maxzoom":300},
                {"id":"casse","nom":"Cassé","type":"fill","minzoom":"bas","maxzoom":19},
                {"nom":"Sans id","type":"line","minzoom":1,"maxzoom":2}]"#,
        )
        .unwrap();
        let entries = parse_catalog(raw);
        assert_eq!(entries.len(), 3);
        let reg = LayerRegistry::from_catalog("http://h", &entries, "parcelles");
        let ids: Vec<_> = reg.all().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["zonage", "pentes"]);
        let slopes = reg.by_id("pentes").unwrap();
        assert_eq!((slopes.zoom_min, slopes.zoom_max), (15, 19));
    }

    #[test]
    fn derived_styles_are_stable_and_prefixed() {
        let reg = LayerRegistry::builtin("http://h");
        let parcels = reg.by_id(PARCEL_LAYER_ID).unwrap();
        assert_eq!(
            parcels.style_ids(),
            vec!["parcelles-fill", "parcelles-outline", "parcelles-selected"]
        );
        let servitudes = reg.by_id("servitudes").unwrap();
        assert_eq!(servitudes.style_ids(), vec!["servitudes-line"]);
        assert!(servitudes.selection_style_id().is_none());
        assert!(parcels
            .style_defs()
            .iter()
            .all(|s| s.source == PARCEL_LAYER_ID));
    }

    #[test]
    fn zoom_window_is_inclusive() {
        let reg = LayerRegistry::builtin("http://h");
        let parcels = reg.by_id(PARCEL_LAYER_ID).unwrap();
        assert!(!parcels.in_range(13));
        assert!(parcels.in_range(14));
        assert!(parcels.in_range(19));
        assert!(!parcels.in_range(20));
    }
}
