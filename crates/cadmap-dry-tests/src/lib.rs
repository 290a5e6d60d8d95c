// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for cadmap crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`api`] - Scripted [`cadmap_api_client::ParcelApi`] fake
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Parcel, feature and catalog builders
//! - [`map`] - Recording [`cadmap_port::MapPort`] that tracks surface state

pub mod api;
pub mod config;
pub mod fixtures;
pub mod map;

pub use api::FakeParcelApi;
pub use config::InMemoryConfigStore;
pub use fixtures::{catalog_entry, category_feature, parcel, parcel_feature, square};
pub use map::RecordingMapPort;
