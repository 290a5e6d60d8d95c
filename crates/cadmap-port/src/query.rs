// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rendered-feature queries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::camera::ScreenPoint;
use crate::highlight::FeatureKey;

/// Area a feature query covers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryArea {
    /// Features under a screen point.
    Point(ScreenPoint),
    /// Every feature currently rendered in the viewport.
    Viewport,
}

/// Query for rendered features, restricted to a set of style layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureQuery {
    /// Area to query.
    pub area: QueryArea,
    /// Style layer ids to restrict the query to. Empty matches nothing.
    pub styles: Vec<String>,
}

impl FeatureQuery {
    /// Query at a point.
    pub fn at(point: ScreenPoint, styles: Vec<String>) -> Self {
        Self {
            area: QueryArea::Point(point),
            styles,
        }
    }

    /// Query the whole viewport.
    pub fn viewport(styles: Vec<String>) -> Self {
        Self {
            area: QueryArea::Viewport,
            styles,
        }
    }
}

/// A feature as reported by the draw surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedFeature {
    /// Stable key (absent when the source has no feature ids).
    pub key: Option<FeatureKey>,
    /// Style layer the feature was drawn by.
    pub style: String,
    /// Feature properties.
    pub properties: Map<String, Value>,
    /// GeoJSON geometry, when the surface exposes it.
    pub geometry: Option<Value>,
}

impl RenderedFeature {
    /// String view of a property; numbers are formatted, other types ignored.
    pub fn property_str(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
