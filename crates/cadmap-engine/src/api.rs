// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request/response shapes of the parcel REST collaborators.
//!
//! The engine never performs I/O; it emits [`ApiRequest`]s tagged with a
//! request token and is fed [`ApiResponse`]s back by the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::parcel::ParcelRef;
use crate::selection::RequestToken;

/// Failure of a remote call, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

impl RemoteError {
    /// Wrap any displayable error.
    pub fn new(err: impl std::fmt::Display) -> Self {
        Self(err.to_string())
    }
}

/// `(section, number)` as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelId {
    /// Cadastral section.
    pub section: String,
    /// Parcel number within the section.
    pub number: String,
}

impl From<&ParcelRef> for ParcelId {
    fn from(p: &ParcelRef) -> Self {
        Self {
            section: p.section.clone(),
            number: p.number.clone(),
        }
    }
}

/// Body of `POST /parcel/unit-geometry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionRequest {
    /// Shared municipality code of the parcels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_code: Option<String>,
    /// Parcels to merge.
    pub parcels: Vec<ParcelId>,
    /// Optional user-given unit name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Properties of a resolved union.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionProperties {
    /// Municipality code of the unit.
    #[serde(default)]
    pub municipality_code: String,
    /// Municipality name.
    #[serde(default)]
    pub municipality_name: Option<String>,
}

/// Response of `POST /parcel/unit-geometry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionResponse {
    /// GeoJSON geometry of the union.
    pub geometry: Value,
    /// Unit properties.
    #[serde(default)]
    pub properties: UnionProperties,
}

/// Zoning attributes of a parcel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zoning {
    /// Zone type (`U`, `AU`, `A`, `N`).
    #[serde(default)]
    pub typezone: Option<String>,
    /// Short zone label (`UA`, `1AUh`).
    #[serde(default)]
    pub label: Option<String>,
    /// Long zone label.
    #[serde(default)]
    pub long_label: Option<String>,
}

/// Body of `POST /zoning/unit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitZoningRequest {
    /// Municipality code of the unit.
    pub municipality_code: String,
    /// Parcels of the unit.
    pub parcels: Vec<ParcelId>,
}

/// One entry of the `POST /zoning/unit` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelZoning {
    /// Cadastral section.
    pub section: String,
    /// Parcel number.
    pub number: String,
    /// Zoning of that parcel.
    #[serde(flatten)]
    pub zoning: Zoning,
}

/// Network work the host must perform for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `GET /zoning/{municipality}/{section}/{number}`.
    Zoning {
        /// Request token.
        token: RequestToken,
        /// Parcel being inspected.
        parcel: ParcelRef,
    },
    /// `POST /parcel/unit-geometry`.
    Union {
        /// Request token.
        token: RequestToken,
        /// Request body.
        request: UnionRequest,
    },
    /// `POST /zoning/unit`.
    UnitZoning {
        /// Request token.
        token: RequestToken,
        /// Request body.
        request: UnitZoningRequest,
    },
}

impl ApiRequest {
    /// Token the eventual response must carry.
    pub fn token(&self) -> RequestToken {
        match self {
            Self::Zoning { token, .. } | Self::Union { token, .. } | Self::UnitZoning { token, .. } => {
                *token
            }
        }
    }
}

/// Completed network work fed back into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Result of [`ApiRequest::Zoning`]; `Ok(None)` is "not found".
    Zoning {
        /// Request token.
        token: RequestToken,
        /// Lookup result.
        result: Result<Option<Zoning>, RemoteError>,
    },
    /// Result of [`ApiRequest::Union`].
    Union {
        /// Request token.
        token: RequestToken,
        /// Union result.
        result: Result<UnionResponse, RemoteError>,
    },
    /// Result of [`ApiRequest::UnitZoning`].
    UnitZoning {
        /// Request token.
        token: RequestToken,
        /// Per-parcel zoning.
        result: Result<Vec<ParcelZoning>, RemoteError>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn union_request_omits_absent_fields() {
        let req = UnionRequest {
            municipality_code: Some("33063".into()),
            parcels: vec![ParcelId {
                section: "AC".into(),
                number: "12".into(),
            }],
            name: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"municipalityCode": "33063", "parcels": [{"section": "AC", "number": "12"}]})
        );
    }

    #[test]
    fn unit_zoning_entries_flatten_zoning() {
        let raw = r#"[{"section":"AC","number":"12","typezone":"U","label":"UA","longLabel":"Zone urbaine centrale"}]"#;
        let parsed: Vec<ParcelZoning> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed[0].zoning.label.as_deref(), Some("UA"));
        assert_eq!(
            parsed[0].zoning.long_label.as_deref(),
            Some("Zone urbaine centrale")
        );
    }
}
