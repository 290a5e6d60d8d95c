// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layer-lifecycle and spatial-selection engine for cadmap.
//!
//! As the user pans and zooms, the engine decides which thematic overlays are
//! attached, shown, hidden, recolored or evicted, and lets the user inspect a
//! parcel or collect several into a land unit whose union is resolved by the
//! parcel API.
//!
//! Everything here is synchronous and free of I/O. Drawing goes through
//! [`cadmap_port::MapPort`]; REST calls leave as [`ApiRequest`]s and come
//! back as [`ApiResponse`]s; time is passed in explicitly.
//!
//! [`MapSession`] wires the components for one map view:
//!
//! - [`LayerRegistry`]: immutable layer catalog.
//! - [`ViewportLayerScheduler`]: zoom/toggle driven attach, hide and LRU eviction.
//! - [`CategoricalStyleCache`]: stable per-category colors.
//! - [`FeatureHighlighter`]: hover and selection feedback.
//! - [`SelectionController`]: inspect / build / resolve state machine.
//! - [`SettleDebouncer`]: collapses camera frames into settle events.

pub mod api;
pub mod highlight;
pub mod parcel;
pub mod registry;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod settle;
pub mod style_cache;

pub use api::{
    ApiRequest, ApiResponse, ParcelId, ParcelZoning, RemoteError, UnionProperties, UnionRequest,
    UnionResponse, UnitZoningRequest, Zoning,
};
pub use highlight::{FeatureHighlighter, SelectionFilter};
pub use parcel::{ParcelRef, ParcelSet, SpatialUnit};
pub use registry::{
    parse_catalog, CatalogEntry, GeometryKind, LayerDescriptor, LayerRegistry, PARCEL_LAYER_ID,
};
pub use scheduler::{ActiveLayerEntry, ScheduleReport, SchedulerError, ViewportLayerScheduler};
pub use selection::{
    RequestToken, SelectionController, SelectionEffect, SelectionError, SelectionState,
};
pub use session::{MapSession, SessionConfig};
pub use settle::SettleDebouncer;
pub use style_cache::CategoricalStyleCache;
