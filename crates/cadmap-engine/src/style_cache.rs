// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-layer categorical color assignment.
//!
//! Each tracked layer keeps an append-only, first-seen-ordered map from
//! category value to color. Colors come from a fixed palette indexed by a
//! BLAKE3 hash of the category string, so the same data renders the same way
//! on every load and in every instance.

use std::collections::HashMap;

use cadmap_port::Color;
use serde_json::{json, Value};
use tracing::debug;

/// Palette categories are hashed into (ColorBrewer "Paired").
pub const PALETTE: [Color; 12] = [
    Color::rgb(0xa6, 0xce, 0xe3),
    Color::rgb(0x1f, 0x78, 0xb4),
    Color::rgb(0xb2, 0xdf, 0x8a),
    Color::rgb(0x33, 0xa0, 0x2c),
    Color::rgb(0xfb, 0x9a, 0x99),
    Color::rgb(0xe3, 0x1a, 0x1c),
    Color::rgb(0xfd, 0xbf, 0x6f),
    Color::rgb(0xff, 0x7f, 0x00),
    Color::rgb(0xca, 0xb2, 0xd6),
    Color::rgb(0x6a, 0x3d, 0x9a),
    Color::rgb(0xff, 0xff, 0x99),
    Color::rgb(0xb1, 0x59, 0x28),
];

/// Color for features whose category was never observed.
pub const FALLBACK_COLOR: Color = Color::rgb(0xcc, 0xcc, 0xcc);

/// Deterministic palette color for a category value.
pub fn palette_color(value: &str) -> Color {
    let digest = blake3::hash(value.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    let len = PALETTE.len() as u64;
    // The remainder is < PALETTE.len(), so it always fits in usize.
    let idx = usize::try_from(u64::from_le_bytes(head) % len).unwrap_or_default();
    PALETTE[idx]
}

#[derive(Debug, Clone)]
struct LayerColors {
    attribute: String,
    assigned: Vec<(String, Color)>,
    index: HashMap<String, usize>,
    rebuilds: u64,
}

impl LayerColors {
    fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_owned(),
            assigned: Vec::new(),
            index: HashMap::new(),
            rebuilds: 0,
        }
    }

    fn observe(&mut self, value: &str) -> bool {
        if self.index.contains_key(value) {
            return false;
        }
        self.index.insert(value.to_owned(), self.assigned.len());
        self.assigned.push((value.to_owned(), palette_color(value)));
        true
    }
}

/// Category → color maps for every tracked layer.
#[derive(Debug, Clone)]
pub struct CategoricalStyleCache {
    layers: HashMap<String, LayerColors>,
    fallback: Color,
}

impl Default for CategoricalStyleCache {
    fn default() -> Self {
        Self::new(FALLBACK_COLOR)
    }
}

impl CategoricalStyleCache {
    /// Empty cache with the given fallback color.
    pub fn new(fallback: Color) -> Self {
        Self {
            layers: HashMap::new(),
            fallback,
        }
    }

    /// Start tracking a layer colored by `attribute`. No-op if already tracked.
    pub fn track(&mut self, layer: &str, attribute: &str) {
        self.layers
            .entry(layer.to_owned())
            .or_insert_with(|| LayerColors::new(attribute));
    }

    /// Whether the layer is tracked.
    pub fn is_tracked(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    /// Drop a layer's map; its next instance starts empty.
    pub fn forget_layer(&mut self, layer: &str) {
        if self.layers.remove(layer).is_some() {
            debug!(layer, "dropped categorical colors");
        }
    }

    /// Record a category value. Returns true when it was new for the layer.
    ///
    /// Values for untracked layers are ignored.
    pub fn observe(&mut self, layer: &str, value: &str) -> bool {
        self.layers
            .get_mut(layer)
            .is_some_and(|colors| colors.observe(value))
    }

    /// Record every value of a rendered batch. Returns true when any was new.
    pub fn observe_batch<'a, I>(&mut self, layer: &str, values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(colors) = self.layers.get_mut(layer) else {
            return false;
        };
        values
            .into_iter()
            .fold(false, |changed, v| colors.observe(v) || changed)
    }

    /// Assigned color, or the fallback when the value was never observed.
    pub fn color_of(&self, layer: &str, value: &str) -> Color {
        self.layers
            .get(layer)
            .and_then(|c| c.index.get(value).map(|&i| c.assigned[i].1))
            .unwrap_or(self.fallback)
    }

    /// Observed values for a layer, in first-seen order.
    pub fn categories(&self, layer: &str) -> Vec<&str> {
        self.layers
            .get(layer)
            .map(|c| c.assigned.iter().map(|(v, _)| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Match-by-category color expression for the layer.
    ///
    /// `["match", ["to-string", ["get", attr]], v1, c1, ..., fallback]`, or the
    /// bare fallback color when nothing has been observed yet.
    pub fn build_style_expression(&self, layer: &str) -> Value {
        let fallback = json!(self.fallback.to_hex());
        let Some(colors) = self.layers.get(layer).filter(|c| !c.assigned.is_empty()) else {
            return fallback;
        };
        let mut expr = Vec::with_capacity(colors.assigned.len() * 2 + 3);
        expr.push(json!("match"));
        expr.push(json!(["to-string", ["get", colors.attribute]]));
        for (value, color) in &colors.assigned {
            expr.push(json!(value));
            expr.push(json!(color.to_hex()));
        }
        expr.push(fallback);
        Value::Array(expr)
    }

    /// Fold a rendered batch and return a fresh expression only if the
    /// category set grew. At most one rebuild per call.
    pub fn restyle<'a, I>(&mut self, layer: &str, values: I) -> Option<Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if !self.observe_batch(layer, values) {
            return None;
        }
        if let Some(colors) = self.layers.get_mut(layer) {
            colors.rebuilds += 1;
        }
        Some(self.build_style_expression(layer))
    }

    /// How many times the layer's expression was rebuilt through [`Self::restyle`].
    pub fn rebuild_count(&self, layer: &str) -> u64 {
        self.layers.get(layer).map_or(0, |c| c.rebuilds)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    #[test]
    fn first_sight_reports_change_once() {
        let mut cache = CategoricalStyleCache::default();
        cache.track("zonage", "typezone");
        assert!(cache.observe("zonage", "UA"));
        assert!(!cache.observe("zonage", "UA"));
        assert!(cache.observe("zonage", "N"));
        assert_eq!(cache.categories("zonage"), vec!["UA", "N"]);
    }

    #[test]
    fn untracked_layers_ignore_observations() {
        let mut cache = CategoricalStyleCache::default();
        assert!(!cache.observe("batiments", "x"));
        assert_eq!(cache.color_of("batiments", "x"), FALLBACK_COLOR);
        assert_eq!(cache.build_style_expression("batiments"), json!("#cccccc"));
    }

    #[test]
    fn colors_are_deterministic_across_instances() {
        let mut a = CategoricalStyleCache::default();
        let mut b = CategoricalStyleCache::default();
        a.track("zonage", "typezone");
        b.track("zonage", "typezone");
        for v in ["UA", "UB", "AU", "N", "A"] {
            a.observe("zonage", v);
        }
        for v in ["A", "N", "AU", "UB", "UA"] {
            b.observe("zonage", v);
        }
        for v in ["UA", "UB", "AU", "N", "A"] {
            assert_eq!(a.color_of("zonage", v), b.color_of("zonage", v));
            assert_eq!(a.color_of("zonage", v), palette_color(v));
        }
    }

    #[test]
    fn expression_lists_categories_in_first_seen_order() {
        let mut cache = CategoricalStyleCache::default();
        cache.track("zonage", "typezone");
        cache.observe("zonage", "UB");
        cache.observe("zonage", "UA");
        let expr = cache.build_style_expression("zonage");
        let arr = expr.as_array().unwrap();
        assert_eq!(arr[0], "match");
        assert_eq!(arr[1], json!(["to-string", ["get", "typezone"]]));
        assert_eq!(arr[2], "UB");
        assert_eq!(arr[3], json!(palette_color("UB").to_hex()));
        assert_eq!(arr[4], "UA");
        assert_eq!(arr.last().unwrap(), "#cccccc");
        assert_eq!(arr.len(), 7);
    }

    #[test]
    fn restyle_rebuilds_once_per_growing_batch() {
        let mut cache = CategoricalStyleCache::default();
        cache.track("zonage", "typezone");
        assert!(cache.restyle("zonage", ["A", "B", "A", "C", "B"]).is_some());
        assert_eq!(cache.rebuild_count("zonage"), 1);
        assert!(cache.restyle("zonage", ["C", "A"]).is_none());
        assert_eq!(cache.rebuild_count("zonage"), 1);
    }

    #[test]
    fn forgetting_a_layer_resets_its_map() {
        let mut cache = CategoricalStyleCache::default();
        cache.track("zonage", "typezone");
        cache.observe("zonage", "UA");
        cache.forget_layer("zonage");
        assert!(!cache.is_tracked("zonage"));
        assert_eq!(cache.color_of("zonage", "UA"), FALLBACK_COLOR);
    }
}
