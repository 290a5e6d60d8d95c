// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map port trait defining the draw-surface contract.

use crate::{FeatureQuery, LngLat, MapCommand, PortError, RenderedFeature, ScreenPoint};

/// Draw-surface port trait.
///
/// The engine owns all scheduling and selection state and talks to the surface
/// only through this trait. Adapters (MapLibre bridge, logging sink, test
/// recorder) implement it.
///
/// # Idempotence
///
/// Adding a source or style layer whose id already exists, or removing one
/// that is absent, should be treated as a no-op by adapters. The engine avoids
/// issuing such commands but does not rely on it.
pub trait MapPort {
    /// Apply a single command to the surface.
    fn apply(&mut self, command: &MapCommand) -> Result<(), PortError>;

    /// Query features currently rendered under a point or across the viewport,
    /// restricted to the style ids in the query.
    fn query_rendered(&self, query: &FeatureQuery) -> Vec<RenderedFeature>;

    /// Project a geographic position to a screen position.
    fn project(&self, position: LngLat) -> ScreenPoint;

    /// Unproject a screen position to a geographic position.
    fn unproject(&self, point: ScreenPoint) -> LngLat;

    /// Screen position of the viewport center.
    fn viewport_center(&self) -> ScreenPoint;
}
