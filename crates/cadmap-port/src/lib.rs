// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Map command port contract for cadmap draw surfaces.
//!
//! This crate defines the boundary between the layer/selection engine and
//! whatever actually draws the map (MapLibre in a webview, a native renderer,
//! a recording fake in tests).
//!
//! # Design Principles
//!
//! - **Surfaces are dumb**: They receive commands and draw. No scheduling or selection logic.
//! - **One-way intents**: The engine emits [`MapCommand`]s; the only reads are feature queries and projections.
//! - **Idempotent by id**: Sources and style layers are addressed by string id.

use thiserror::Error;

/// Error type for command application on a draw surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// The surface refused to register a tile source (bad template, network setup failure).
    #[error("source rejected: {0}")]
    SourceRejected(String),
    /// The surface refused a style layer (unknown source, invalid paint/filter).
    #[error("style rejected: {0}")]
    StyleRejected(String),
    /// A backend-specific error occurred.
    #[error("backend error: {0}")]
    Backend(String),
}

mod camera;
mod highlight;
mod port;
mod query;
mod types;

pub use camera::{BoundingBox, CameraMove, LngLat, ScreenPoint};
pub use highlight::{FeatureKey, FEATURE_STATE_HOVER};
pub use port::MapPort;
pub use query::{FeatureQuery, QueryArea, RenderedFeature};
pub use types::{Color, MapCommand, SourceDef, StyleKind, StyleLayerDef};
