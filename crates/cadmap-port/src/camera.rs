// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Geographic/screen positions and camera moves.

use serde::{Deserialize, Serialize};

/// Geographic position (WGS84 degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    /// Longitude in degrees.
    pub lng: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl LngLat {
    /// Construct from longitude/latitude.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Screen position in CSS pixels, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    /// Horizontal pixel offset.
    pub x: f32,
    /// Vertical pixel offset.
    pub y: f32,
}

impl ScreenPoint {
    /// Construct from pixel offsets.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Geographic bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// South-west corner.
    pub min: LngLat,
    /// North-east corner.
    pub max: LngLat,
}

impl BoundingBox {
    /// Smallest box containing every position, or `None` when empty.
    pub fn around(points: impl IntoIterator<Item = LngLat>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            min: first,
            max: first,
        };
        Some(iter.fold(init, |mut acc, p| {
            acc.min.lng = acc.min.lng.min(p.lng);
            acc.min.lat = acc.min.lat.min(p.lat);
            acc.max.lng = acc.max.lng.max(p.lng);
            acc.max.lat = acc.max.lat.max(p.lat);
            acc
        }))
    }

    /// Center of the box.
    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min.lng + self.max.lng) / 2.0,
            (self.min.lat + self.max.lat) / 2.0,
        )
    }
}

/// Animated camera move.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraMove {
    /// Fit a bounding box with padding (pixels).
    FitBounds {
        /// Target box.
        bounds: BoundingBox,
        /// Padding around the box in pixels.
        padding: f32,
    },
    /// Fly to a point at a zoom level.
    FlyTo {
        /// Target center.
        center: LngLat,
        /// Target zoom.
        zoom: f64,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    #[test]
    fn bounding_box_covers_all_points() {
        let bb = BoundingBox::around([
            LngLat::new(-0.58, 44.84),
            LngLat::new(-0.57, 44.83),
            LngLat::new(-0.59, 44.85),
        ])
        .unwrap();
        assert_eq!(bb.min, LngLat::new(-0.59, 44.83));
        assert_eq!(bb.max, LngLat::new(-0.57, 44.85));
    }

    #[test]
    fn empty_box_is_none() {
        assert!(BoundingBox::around(std::iter::empty()).is_none());
    }
}
