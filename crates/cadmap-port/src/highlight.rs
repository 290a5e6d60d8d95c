// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Feature identity for transient state (hover/selection feedback).

use serde::{Deserialize, Serialize};

/// Feature-state key used for hover feedback.
pub const FEATURE_STATE_HOVER: &str = "hover";

/// Stable identity of a rendered feature across tiles.
///
/// Feature ids are only unique within a source, so the source id is part of
/// the key; the style layer the feature was picked from is not.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureKey {
    /// Source id.
    pub source: String,
    /// Source layer inside the vector tiles.
    pub source_layer: String,
    /// Feature id within the source.
    pub id: u64,
}

impl FeatureKey {
    /// Construct a key.
    pub fn new(source: impl Into<String>, source_layer: impl Into<String>, id: u64) -> Self {
        Self {
            source: source.into(),
            source_layer: source_layer.into(),
            id,
        }
    }
}
