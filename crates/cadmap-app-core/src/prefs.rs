// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared map preferences used by cadmap hosts (API, layers, selection, camera).

use serde::{Deserialize, Serialize};

/// Saved preferences for a map host.
///
/// Every section defaults field-by-field so older prefs files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MapPrefs {
    /// Remote API settings.
    pub api: ApiPrefs,
    /// Layer scheduling settings and user toggles.
    pub layers: LayerPrefs,
    /// Selection and unit-builder settings.
    pub selection: SelectionPrefs,
    /// Last camera position.
    pub camera: CameraPrefs,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiPrefs {
    /// Base URL for tiles, catalog and parcel endpoints.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ApiPrefs {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Layer scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LayerPrefs {
    /// Maximum number of concurrently attached layers.
    pub capacity: usize,
    /// Ids of layers toggled on by the user.
    pub visible: Vec<String>,
    /// Quiet period before a camera change counts as settled, in milliseconds.
    pub settle_quiet_ms: u64,
}

impl Default for LayerPrefs {
    fn default() -> Self {
        Self {
            capacity: 5,
            visible: vec!["parcelles".into()],
            settle_quiet_ms: 250,
        }
    }
}

/// Selection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionPrefs {
    /// Maximum parcels in one land unit.
    pub max_unit_size: usize,
    /// Inspect the parcel under the viewport center after each settle at or
    /// above this zoom. `None` disables it.
    pub auto_inspect_min_zoom: Option<u8>,
}

impl Default for SelectionPrefs {
    fn default() -> Self {
        Self {
            max_unit_size: 5,
            auto_inspect_min_zoom: None,
        }
    }
}

/// Camera center and zoom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraPrefs {
    /// Center as `[lng, lat]`.
    pub center: [f64; 2],
    /// Zoom level.
    pub zoom: f64,
}

impl Default for CameraPrefs {
    fn default() -> Self {
        Self {
            center: [-0.5792, 44.8378],
            zoom: 12.0,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;

    #[test]
    fn partial_prefs_fill_defaults() {
        let prefs: MapPrefs =
            serde_json::from_str(r#"{"layers":{"capacity":2}}"#).unwrap();
        assert_eq!(prefs.layers.capacity, 2);
        assert_eq!(prefs.layers.settle_quiet_ms, 250);
        assert_eq!(prefs.selection.max_unit_size, 5);
        assert_eq!(prefs.api, ApiPrefs::default());
    }
}
