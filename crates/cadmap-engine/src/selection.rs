// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parcel inspection and land-unit building.
//!
//! [`SelectionController`] is a synchronous state machine. Operations return
//! [`SelectionEffect`]s for the caller to run (REST lookups, highlight
//! updates, camera fits); results come back through [`SelectionController::on_response`].
//! Each request carries a [`RequestToken`]; a response whose token is no
//! longer current is dropped, so a cancelled confirm cannot resurrect a
//! stale selection.

use std::collections::BTreeSet;
use std::fmt;

use cadmap_port::BoundingBox;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{
    ApiRequest, ApiResponse, ParcelId, ParcelZoning, RemoteError, UnionRequest, UnionResponse,
    UnitZoningRequest, Zoning,
};
use crate::highlight::SelectionFilter;
use crate::parcel::{ParcelRef, ParcelSet, SpatialUnit};

/// Monotonic identity of an outstanding request.
pub type RequestToken = u64;

/// Default upper bound on parcels per unit.
pub const DEFAULT_MAX_UNIT_SIZE: usize = 5;

/// Minimum parcels for a unit.
pub const MIN_UNIT_SIZE: usize = 2;

/// Live selection state; exactly one holds at any time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    /// Nothing selected (a resolved unit may be held, see [`SelectionController::unit`]).
    #[default]
    Idle,
    /// A single parcel is shown with its zoning.
    Inspecting {
        /// Inspected parcel.
        parcel: ParcelRef,
        /// Zoning, absent when not found or the lookup failed.
        zoning: Option<Zoning>,
    },
    /// Builder mode: parcels are being collected.
    Accumulating(ParcelSet),
    /// Builder mode: the union request is in flight.
    ResolvingUnion(ParcelSet),
}

impl SelectionState {
    /// Stable state name for logs and UI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Inspecting { .. } => "inspecting",
            Self::Accumulating(_) => "accumulating",
            Self::ResolvingUnion(_) => "resolving_union",
        }
    }

    /// Parcels of the unit being built, if in builder mode.
    pub fn parcels(&self) -> Option<&ParcelSet> {
        match self {
            Self::Accumulating(set) | Self::ResolvingUnion(set) => Some(set),
            Self::Idle | Self::Inspecting { .. } => None,
        }
    }
}

/// Work the caller must perform after a controller operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEffect {
    /// Run a REST request and feed the response back.
    Request(ApiRequest),
    /// Replace the drawn selection.
    Highlight(SelectionFilter),
    /// Fit the camera to a box.
    FitBounds(BoundingBox),
}

/// Rejected selection operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Adding would exceed the unit size limit.
    #[error("a unit holds at most {max} parcels")]
    TooManyParcels {
        /// Configured limit.
        max: usize,
    },
    /// Too few parcels to confirm.
    #[error("a unit needs at least 2 parcels (have {count})")]
    TooFewParcels {
        /// Parcels currently collected.
        count: usize,
    },
    /// Parcels belong to several municipalities.
    #[error("parcels span several municipalities: {}", .codes.join(", "))]
    MixedMunicipalities {
        /// Distinct non-empty municipality codes, sorted.
        codes: Vec<String>,
    },
    /// No parcel carries a municipality code.
    #[error("no parcel carries a municipality code")]
    MissingMunicipality,
    /// Operation needs builder mode.
    #[error("not building a unit")]
    NotAccumulating,
    /// The union request failed; the collected parcels are kept.
    #[error("union request failed: {0}")]
    UnionFailed(String),
    /// A zoning lookup for the resolved unit failed.
    #[error("zoning lookup failed: {0}")]
    LookupFailed(String),
}

impl SelectionError {
    /// Stable machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::TooManyParcels { .. } => "too_many_parcels",
            Self::TooFewParcels { .. } => "too_few_parcels",
            Self::MixedMunicipalities { .. } => "mixed_municipalities",
            Self::MissingMunicipality => "missing_municipality",
            Self::NotAccumulating => "not_accumulating",
            Self::UnionFailed(_) => "union_failed",
            Self::LookupFailed(_) => "lookup_failed",
        }
    }
}

/// Single municipality code shared by `parcels`.
///
/// Parcels with an empty code take the code of the others.
pub fn shared_municipality<'a>(
    parcels: impl IntoIterator<Item = &'a ParcelRef>,
) -> Result<String, SelectionError> {
    let codes: BTreeSet<&str> = parcels
        .into_iter()
        .filter(|p| p.has_municipality())
        .map(|p| p.municipality_code.as_str())
        .collect();
    let mut iter = codes.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(SelectionError::MissingMunicipality),
        (Some(code), None) => Ok((*code).to_owned()),
        (Some(_), Some(_)) => Err(SelectionError::MixedMunicipalities {
            codes: codes.iter().map(|c| (*c).to_owned()).collect(),
        }),
    }
}

#[derive(Debug, Clone)]
struct PendingInspect {
    token: RequestToken,
    parcel: ParcelRef,
}

#[derive(Debug, Clone)]
struct PendingUnion {
    token: RequestToken,
    municipality_code: String,
}

/// Inspection and unit-building state machine.
pub struct SelectionController {
    state: SelectionState,
    max_unit_size: usize,
    next_token: RequestToken,
    inspect: Option<PendingInspect>,
    union: Option<PendingUnion>,
    unit_zoning: Option<RequestToken>,
    unit_name: Option<String>,
    unit: Option<SpatialUnit>,
}

impl fmt::Debug for SelectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionController")
            .field("state", &self.state.name())
            .field("max_unit_size", &self.max_unit_size)
            .field("next_token", &self.next_token)
            .field("has_unit", &self.unit.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNIT_SIZE)
    }
}

impl SelectionController {
    /// Controller in `Idle` with the given unit size limit (at least 2).
    pub fn new(max_unit_size: usize) -> Self {
        Self {
            state: SelectionState::Idle,
            max_unit_size: max_unit_size.max(MIN_UNIT_SIZE),
            next_token: 1,
            inspect: None,
            union: None,
            unit_zoning: None,
            unit_name: None,
            unit: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Last resolved unit.
    pub fn unit(&self) -> Option<&SpatialUnit> {
        self.unit.as_ref()
    }

    /// True in `Accumulating` or `ResolvingUnion`.
    pub fn is_builder_mode(&self) -> bool {
        self.state.parcels().is_some()
    }

    /// Configured unit size limit.
    pub fn max_unit_size(&self) -> usize {
        self.max_unit_size
    }

    /// Parcel whose zoning lookup is outstanding.
    pub fn pending_inspect(&self) -> Option<&ParcelRef> {
        self.inspect.as_ref().map(|p| &p.parcel)
    }

    /// Whether a response carrying `token` would still be applied.
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.inspect.as_ref().is_some_and(|p| p.token == token)
            || self.union.as_ref().is_some_and(|p| p.token == token)
            || self.unit_zoning == Some(token)
    }

    /// Name sent with the next union request; blank clears it.
    pub fn set_unit_name(&mut self, name: Option<&str>) {
        self.unit_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned);
    }

    fn issue_token(&mut self) -> RequestToken {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    /// Handle a click on a parcel.
    ///
    /// Outside builder mode this starts a zoning lookup; the state becomes
    /// `Inspecting` once the result arrives. In builder mode it toggles the
    /// parcel. While the union is resolving, clicks are ignored.
    pub fn click(&mut self, parcel: ParcelRef) -> Result<Vec<SelectionEffect>, SelectionError> {
        if matches!(
            self.state,
            SelectionState::Idle | SelectionState::Inspecting { .. }
        ) {
            let token = self.issue_token();
            debug!(token, section = %parcel.section, number = %parcel.number, "inspect");
            self.inspect = Some(PendingInspect {
                token,
                parcel: parcel.clone(),
            });
            return Ok(vec![SelectionEffect::Request(ApiRequest::Zoning {
                token,
                parcel,
            })]);
        }
        let max = self.max_unit_size;
        let SelectionState::Accumulating(set) = &mut self.state else {
            debug!("click ignored while resolving union");
            return Ok(Vec::new());
        };
        if !set.remove(&parcel) {
            if set.len() >= max {
                return Err(SelectionError::TooManyParcels { max });
            }
            set.insert(parcel);
        }
        Ok(vec![SelectionEffect::Highlight(SelectionFilter::parcels(
            set.iter(),
        ))])
    }

    /// Turn builder mode on or off.
    ///
    /// Turning it off drops collected parcels and any in-flight union.
    pub fn set_builder_mode(&mut self, on: bool) -> Vec<SelectionEffect> {
        if on == self.is_builder_mode() {
            return Vec::new();
        }
        self.inspect = None;
        self.union = None;
        self.state = if on {
            SelectionState::Accumulating(ParcelSet::new())
        } else {
            SelectionState::Idle
        };
        vec![SelectionEffect::Highlight(SelectionFilter::none())]
    }

    /// Validate the collected parcels and request their union.
    ///
    /// Validation failures leave the state untouched and issue no request.
    pub fn confirm(&mut self) -> Result<Vec<SelectionEffect>, SelectionError> {
        let SelectionState::Accumulating(set) = &self.state else {
            return Err(SelectionError::NotAccumulating);
        };
        if set.len() < MIN_UNIT_SIZE {
            return Err(SelectionError::TooFewParcels { count: set.len() });
        }
        let municipality_code = shared_municipality(set)?;
        let set = set.clone();
        let token = self.issue_token();
        let request = UnionRequest {
            municipality_code: Some(municipality_code.clone()),
            parcels: set.iter().map(ParcelId::from).collect(),
            name: self.unit_name.clone(),
        };
        info!(token, parcels = set.len(), municipality = %municipality_code, "resolving union");
        self.union = Some(PendingUnion {
            token,
            municipality_code,
        });
        self.state = SelectionState::ResolvingUnion(set);
        Ok(vec![SelectionEffect::Request(ApiRequest::Union {
            token,
            request,
        })])
    }

    /// Return to `Idle`, dropping visuals, the held unit and in-flight requests.
    pub fn cancel(&mut self) -> Vec<SelectionEffect> {
        self.state = SelectionState::Idle;
        self.inspect = None;
        self.union = None;
        self.unit_zoning = None;
        self.unit = None;
        vec![SelectionEffect::Highlight(SelectionFilter::none())]
    }

    /// Feed back a completed request. Stale responses yield no effects.
    pub fn on_response(
        &mut self,
        response: ApiResponse,
    ) -> Result<Vec<SelectionEffect>, SelectionError> {
        match response {
            ApiResponse::Zoning { token, result } => Ok(self.on_zoning(token, result)),
            ApiResponse::Union { token, result } => self.on_union_resolved(token, result),
            ApiResponse::UnitZoning { token, result } => {
                self.on_unit_zoning(token, result).map(|_| Vec::new())
            }
        }
    }

    /// Publish `Inspecting` for a finished zoning lookup.
    pub fn on_zoning(
        &mut self,
        token: RequestToken,
        result: Result<Option<Zoning>, RemoteError>,
    ) -> Vec<SelectionEffect> {
        if !self.inspect.as_ref().is_some_and(|p| p.token == token) {
            debug!(token, "stale zoning response dropped");
            return Vec::new();
        }
        let Some(PendingInspect { parcel, .. }) = self.inspect.take() else {
            return Vec::new();
        };
        let zoning = match result {
            Ok(zoning) => zoning,
            Err(err) => {
                warn!(token, error = %err, "zoning lookup failed");
                None
            }
        };
        let filter = SelectionFilter::parcels([&parcel]);
        self.state = SelectionState::Inspecting { parcel, zoning };
        vec![SelectionEffect::Highlight(filter)]
    }

    /// Apply a finished union request.
    ///
    /// On success the controller goes `Idle` holding the new unit and asks
    /// for its zoning and a camera fit. On failure it goes back to
    /// `Accumulating` with the same parcels and reports the error.
    pub fn on_union_resolved(
        &mut self,
        token: RequestToken,
        result: Result<UnionResponse, RemoteError>,
    ) -> Result<Vec<SelectionEffect>, SelectionError> {
        let current = self.union.as_ref().is_some_and(|p| p.token == token);
        let SelectionState::ResolvingUnion(set) = &self.state else {
            debug!(token, "union response outside resolution dropped");
            return Ok(Vec::new());
        };
        if !current {
            debug!(token, "stale union response dropped");
            return Ok(Vec::new());
        }
        let set = set.clone();
        let Some(pending) = self.union.take() else {
            return Ok(Vec::new());
        };
        match result {
            Err(err) => {
                warn!(token, error = %err, "union request failed");
                self.state = SelectionState::Accumulating(set);
                Err(SelectionError::UnionFailed(err.0))
            }
            Ok(resp) => {
                let municipality_code = if resp.properties.municipality_code.is_empty() {
                    pending.municipality_code
                } else {
                    resp.properties.municipality_code
                };
                let parcels: Vec<ParcelRef> = set.iter().cloned().collect();
                let unit = SpatialUnit {
                    zoning: vec![None; parcels.len()],
                    parcels,
                    union_geometry: resp.geometry,
                    municipality_code,
                    municipality_name: resp.properties.municipality_name,
                    name: self.unit_name.clone(),
                };
                info!(token, parcels = unit.parcels.len(), "union resolved");
                let zoning_token = self.issue_token();
                let mut effects = vec![
                    SelectionEffect::Highlight(SelectionFilter::parcels(&unit.parcels)),
                    SelectionEffect::Request(ApiRequest::UnitZoning {
                        token: zoning_token,
                        request: UnitZoningRequest {
                            municipality_code: unit.municipality_code.clone(),
                            parcels: unit.parcels.iter().map(ParcelId::from).collect(),
                        },
                    }),
                ];
                if let Some(bounds) = unit.bounds() {
                    effects.push(SelectionEffect::FitBounds(bounds));
                }
                self.unit_zoning = Some(zoning_token);
                self.unit = Some(unit);
                self.state = SelectionState::Idle;
                Ok(effects)
            }
        }
    }

    /// Attach batch zoning results to the held unit. Returns whether they applied.
    pub fn on_unit_zoning(
        &mut self,
        token: RequestToken,
        result: Result<Vec<ParcelZoning>, RemoteError>,
    ) -> Result<bool, SelectionError> {
        if self.unit_zoning != Some(token) {
            debug!(token, "stale unit zoning response dropped");
            return Ok(false);
        }
        self.unit_zoning = None;
        let entries = result.map_err(|err| SelectionError::LookupFailed(err.0))?;
        let Some(unit) = self.unit.as_mut() else {
            return Ok(false);
        };
        for entry in entries {
            let key = ParcelRef::new(&entry.section, &entry.number, "");
            if let Some(idx) = unit.parcels.iter().position(|p| p.same_parcel(&key)) {
                unit.zoning[idx] = Some(entry.zoning);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::api::UnionProperties;
    use serde_json::json;

    fn p(section: &str, number: &str, code: &str) -> ParcelRef {
        ParcelRef::new(section, number, code)
    }

    fn union_token(effects: &[SelectionEffect]) -> RequestToken {
        effects
            .iter()
            .find_map(|e| match e {
                SelectionEffect::Request(req @ ApiRequest::Union { .. }) => Some(req.token()),
                _ => None,
            })
            .unwrap()
    }

    fn ok_union() -> Result<UnionResponse, RemoteError> {
        Ok(UnionResponse {
            geometry: json!({"type": "Polygon", "coordinates": [[[-0.58, 44.84], [-0.57, 44.85], [-0.58, 44.84]]]}),
            properties: UnionProperties {
                municipality_code: "33063".into(),
                municipality_name: Some("Bordeaux".into()),
            },
        })
    }

    #[test]
    fn empty_codes_take_the_shared_code() {
        let parcels = [p("AC", "12", "33063"), p("AC", "45", "")];
        assert_eq!(shared_municipality(&parcels).unwrap(), "33063");
        assert_eq!(
            shared_municipality(&[p("AC", "12", ""), p("AC", "45", "")]),
            Err(SelectionError::MissingMunicipality)
        );
    }

    #[test]
    fn inspect_publishes_after_zoning_arrives() {
        let mut c = SelectionController::default();
        let fx = c.click(p("AC", "12", "33063")).unwrap();
        let token = match &fx[0] {
            SelectionEffect::Request(req) => req.token(),
            other => unreachable!("unexpected effect {other:?}"),
        };
        assert_eq!(c.state(), &SelectionState::Idle);
        let zoning = Zoning {
            label: Some("UA".into()),
            ..Zoning::default()
        };
        let fx = c.on_zoning(token, Ok(Some(zoning.clone())));
        assert_eq!(fx.len(), 1);
        assert!(matches!(
            c.state(),
            SelectionState::Inspecting { zoning: Some(z), .. } if *z == zoning
        ));
    }

    #[test]
    fn retargeted_inspect_drops_the_older_lookup() {
        let mut c = SelectionController::default();
        c.click(p("AC", "12", "33063")).unwrap();
        let first = c.next_token - 1;
        c.click(p("AC", "45", "33063")).unwrap();
        assert!(c.on_zoning(first, Ok(None)).is_empty());
        assert_eq!(c.pending_inspect(), Some(&p("AC", "45", "")));
    }

    #[test]
    fn toggle_and_limit() {
        let mut c = SelectionController::new(2);
        c.set_builder_mode(true);
        c.click(p("AC", "12", "33063")).unwrap();
        c.click(p("AC", "45", "33063")).unwrap();
        let err = c.click(p("AC", "46", "33063")).unwrap_err();
        assert_eq!(err.reason_code(), "too_many_parcels");
        // removing is still allowed at the limit
        c.click(p("AC", "12", "33063")).unwrap();
        assert_eq!(c.state().parcels().unwrap().len(), 1);
    }

    #[test]
    fn confirm_rejects_small_and_not_building() {
        let mut c = SelectionController::default();
        assert_eq!(c.confirm(), Err(SelectionError::NotAccumulating));
        c.set_builder_mode(true);
        c.click(p("AC", "12", "33063")).unwrap();
        assert_eq!(c.confirm(), Err(SelectionError::TooFewParcels { count: 1 }));
        assert!(matches!(c.state(), SelectionState::Accumulating(_)));
    }

    #[test]
    fn failure_restores_accumulation() {
        let mut c = SelectionController::default();
        c.set_builder_mode(true);
        c.click(p("AC", "12", "33063")).unwrap();
        c.click(p("AC", "45", "33063")).unwrap();
        let before = c.state().parcels().cloned().unwrap();
        let token = union_token(&c.confirm().unwrap());
        let err = c
            .on_union_resolved(token, Err(RemoteError::new("502 Bad Gateway")))
            .unwrap_err();
        assert_eq!(err.reason_code(), "union_failed");
        assert_eq!(c.state(), &SelectionState::Accumulating(before));
    }

    #[test]
    fn success_holds_unit_then_fills_zoning() {
        let mut c = SelectionController::default();
        c.set_builder_mode(true);
        c.set_unit_name(Some("  Lot A "));
        c.click(p("AC", "12", "33063")).unwrap();
        c.click(p("AC", "45", "")).unwrap();
        let token = union_token(&c.confirm().unwrap());
        let fx = c.on_union_resolved(token, ok_union()).unwrap();
        assert_eq!(c.state(), &SelectionState::Idle);
        assert!(!c.is_builder_mode());
        let unit = c.unit().unwrap();
        assert_eq!(unit.name.as_deref(), Some("Lot A"));
        assert_eq!(unit.municipality_code, "33063");
        assert!(fx.iter().any(|e| matches!(e, SelectionEffect::FitBounds(_))));
        let zoning_token = fx
            .iter()
            .find_map(|e| match e {
                SelectionEffect::Request(req @ ApiRequest::UnitZoning { .. }) => Some(req.token()),
                _ => None,
            })
            .unwrap();
        let entries = vec![ParcelZoning {
            section: "AC".into(),
            number: "45".into(),
            zoning: Zoning {
                typezone: Some("U".into()),
                ..Zoning::default()
            },
        }];
        assert!(c.on_unit_zoning(zoning_token, Ok(entries)).unwrap());
        let unit = c.unit().unwrap();
        assert!(unit.zoning[0].is_none());
        assert_eq!(unit.zoning[1].as_ref().unwrap().typezone.as_deref(), Some("U"));
    }

    #[test]
    fn builder_off_invalidates_the_union() {
        let mut c = SelectionController::default();
        c.set_builder_mode(true);
        c.click(p("AC", "12", "33063")).unwrap();
        c.click(p("AC", "45", "33063")).unwrap();
        let token = union_token(&c.confirm().unwrap());
        assert!(c.is_current(token));
        c.set_builder_mode(false);
        assert!(!c.is_current(token));
        assert!(c.on_union_resolved(token, ok_union()).unwrap().is_empty());
        assert!(c.unit().is_none());
        assert_eq!(c.state(), &SelectionState::Idle);
    }

    #[test]
    fn clicks_ignored_while_resolving() {
        let mut c = SelectionController::default();
        c.set_builder_mode(true);
        c.click(p("AC", "12", "33063")).unwrap();
        c.click(p("AC", "45", "33063")).unwrap();
        c.confirm().unwrap();
        assert!(c.click(p("AC", "46", "33063")).unwrap().is_empty());
        assert_eq!(c.state().parcels().unwrap().len(), 2);
    }
}
