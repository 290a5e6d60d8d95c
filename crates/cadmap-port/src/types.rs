// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core command types for the map port contract.
//!
//! Paint values and filters are carried as `serde_json::Value` expressions in
//! the MapLibre style-spec dialect; the port does not interpret them.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::camera::CameraMove;
use crate::highlight::FeatureKey;

/// RGBA color with 8-bit components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Parse `#rrggbb` or `#rrggbbaa`. Returns `None` for anything else.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Some(Self([byte(0)?, byte(2)?, byte(4)?, alpha]))
    }

    /// `#rrggbb` form (alpha dropped when opaque, `#rrggbbaa` otherwise).
    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Remote vector-tile source registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDef {
    /// Source id (one per thematic layer).
    pub id: String,
    /// Tile URL template with `{z}/{x}/{y}` placeholders.
    pub tiles: String,
    /// Minimum zoom the source serves.
    pub min_zoom: u8,
    /// Maximum zoom the source serves.
    pub max_zoom: u8,
}

/// Kind of style layer drawn from a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    /// Polygon fill.
    Fill,
    /// Stroked line.
    Line,
    /// Circle marker.
    Circle,
}

/// A style layer drawn from a source layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleLayerDef {
    /// Style layer id.
    pub id: String,
    /// Source the layer reads from.
    pub source: String,
    /// Layer name inside the vector tiles.
    pub source_layer: String,
    /// Drawing kind.
    pub kind: StyleKind,
    /// Paint properties (`fill-color`, `line-width`, ...).
    pub paint: serde_json::Map<String, Value>,
    /// Optional filter expression.
    pub filter: Option<Value>,
    /// Whether the layer starts visible.
    pub visible: bool,
}

/// Draw-surface command.
///
/// Commands are applied in order; each targets a source, style layer or the camera.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapCommand {
    /// Register a remote tile source.
    AddSource(SourceDef),
    /// Remove a source (all its style layers must already be removed).
    RemoveSource {
        /// Source id.
        id: String,
    },
    /// Add a style layer.
    AddStyleLayer(StyleLayerDef),
    /// Remove a style layer.
    RemoveStyleLayer {
        /// Style layer id.
        id: String,
    },
    /// Show or hide a style layer without touching its source.
    SetVisibility {
        /// Style layer id.
        id: String,
        /// Target visibility.
        visible: bool,
    },
    /// Replace one paint property of a style layer.
    SetPaint {
        /// Style layer id.
        id: String,
        /// Paint property name.
        property: String,
        /// Literal or expression value.
        value: Value,
    },
    /// Replace the filter of a style layer.
    SetFilter {
        /// Style layer id.
        id: String,
        /// Filter expression.
        filter: Value,
    },
    /// Set a transient boolean feature state (hover, selected).
    SetFeatureState {
        /// Feature being marked.
        feature: FeatureKey,
        /// State key.
        key: String,
        /// State value.
        value: bool,
    },
    /// Route pointer events for a style layer to the engine.
    BindPointer {
        /// Style layer id.
        id: String,
    },
    /// Stop routing pointer events for a style layer.
    UnbindPointer {
        /// Style layer id.
        id: String,
    },
    /// Animate the camera.
    Camera(CameraMove),
}

impl MapCommand {
    /// Id of the source or style layer the command targets, if any.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::AddSource(def) => Some(&def.id),
            Self::AddStyleLayer(def) => Some(&def.id),
            Self::RemoveSource { id }
            | Self::RemoveStyleLayer { id }
            | Self::SetVisibility { id, .. }
            | Self::SetPaint { id, .. }
            | Self::SetFilter { id, .. }
            | Self::BindPointer { id }
            | Self::UnbindPointer { id } => Some(id),
            Self::SetFeatureState { feature, .. } => Some(&feature.source),
            Self::Camera(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    #[test]
    fn hex_round_trips_opaque_and_alpha() {
        let c = Color::from_hex("#1f78b4").unwrap();
        assert_eq!(c, Color::rgb(0x1f, 0x78, 0xb4));
        assert_eq!(c.to_hex(), "#1f78b4");
        let a = Color::from_hex("#1f78b480").unwrap();
        assert_eq!(a.0[3], 0x80);
        assert_eq!(a.to_hex(), "#1f78b480");
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(Color::from_hex("1f78b4").is_none());
        assert!(Color::from_hex("#12345").is_none());
        assert!(Color::from_hex("#zzzzzz").is_none());
    }

    #[test]
    fn command_serializes_with_op_tag() {
        let cmd = MapCommand::SetVisibility {
            id: "zonage-fill".into(),
            visible: false,
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["op"], "set_visibility");
        assert_eq!(cmd.target_id(), Some("zonage-fill"));
    }
}
