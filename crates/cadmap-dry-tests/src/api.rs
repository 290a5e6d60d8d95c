// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted parcel API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cadmap_api_client::{ApiError, ParcelApi};
use cadmap_engine::{
    ApiRequest, ApiResponse, CatalogEntry, ParcelRef, ParcelZoning, RemoteError, UnionProperties,
    UnionRequest, UnionResponse, UnitZoningRequest, Zoning,
};
use serde_json::json;

/// In-memory [`ParcelApi`] with canned answers and call counters.
///
/// Clones share state. Unions succeed with a square around the first
/// parcel unless [`FakeParcelApi::fail_union`] is set; zoning lookups answer
/// from the table filled with [`FakeParcelApi::set_zoning`].
#[derive(Clone, Default)]
pub struct FakeParcelApi {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    catalog: Vec<CatalogEntry>,
    zoning: HashMap<(String, String), Zoning>,
    union_failure: Option<String>,
    calls: Vec<&'static str>,
}

impl FakeParcelApi {
    /// Fake with an empty catalog and no zoning.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Catalog served by `fetch_catalog`.
    pub fn set_catalog(&self, entries: Vec<CatalogEntry>) {
        self.lock().catalog = entries;
    }

    /// Zoning answered for `(section, number)`.
    pub fn set_zoning(&self, section: &str, number: &str, zoning: Zoning) {
        let key = ParcelRef::new(section, number, "").identity();
        self.lock().zoning.insert(key, zoning);
    }

    /// Make union requests fail with `message` (`None` restores success).
    pub fn fail_union(&self, message: Option<&str>) {
        self.lock().union_failure = message.map(str::to_owned);
    }

    /// Endpoints called, in order (`catalog`, `zoning`, `union`, `unit_zoning`).
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Calls made to one endpoint.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == endpoint).count()
    }

    /// Answer an engine request synchronously.
    pub fn respond(&self, request: &ApiRequest) -> ApiResponse {
        let token = request.token();
        match request {
            ApiRequest::Zoning { parcel, .. } => ApiResponse::Zoning {
                token,
                result: self.zoning_for(parcel).map_err(RemoteError::new),
            },
            ApiRequest::Union { request, .. } => ApiResponse::Union {
                token,
                result: self.union_for(request).map_err(RemoteError::new),
            },
            ApiRequest::UnitZoning { request, .. } => ApiResponse::UnitZoning {
                token,
                result: self.unit_zoning_for(request).map_err(RemoteError::new),
            },
        }
    }

    fn zoning_for(&self, parcel: &ParcelRef) -> Result<Option<Zoning>, ApiError> {
        let mut inner = self.lock();
        inner.calls.push("zoning");
        Ok(inner
            .zoning
            .get(&parcel.identity())
            .cloned())
    }

    fn union_for(&self, request: &UnionRequest) -> Result<UnionResponse, ApiError> {
        let mut inner = self.lock();
        inner.calls.push("union");
        if let Some(body) = inner.union_failure.clone() {
            return Err(ApiError::Status { status: 502, body });
        }
        Ok(UnionResponse {
            geometry: json!({
                "type": "Polygon",
                "coordinates": [[[-0.58, 44.84], [-0.57, 44.84], [-0.57, 44.85], [-0.58, 44.85], [-0.58, 44.84]]]
            }),
            properties: UnionProperties {
                municipality_code: request.municipality_code.clone().unwrap_or_default(),
                municipality_name: Some("Bordeaux".into()),
            },
        })
    }

    fn unit_zoning_for(&self, request: &UnitZoningRequest) -> Result<Vec<ParcelZoning>, ApiError> {
        let mut inner = self.lock();
        inner.calls.push("unit_zoning");
        Ok(request
            .parcels
            .iter()
            .filter_map(|p| {
                inner
                    .zoning
                    .get(&ParcelRef::new(&p.section, &p.number, "").identity())
                    .map(|z| ParcelZoning {
                        section: p.section.clone(),
                        number: p.number.clone(),
                        zoning: z.clone(),
                    })
            })
            .collect())
    }
}

impl ParcelApi for FakeParcelApi {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        let mut inner = self.lock();
        inner.calls.push("catalog");
        Ok(inner.catalog.clone())
    }

    async fn lookup_zoning(&self, parcel: &ParcelRef) -> Result<Option<Zoning>, ApiError> {
        self.zoning_for(parcel)
    }

    async fn resolve_union(&self, request: &UnionRequest) -> Result<UnionResponse, ApiError> {
        self.union_for(request)
    }

    async fn lookup_unit_zoning(
        &self,
        request: &UnitZoningRequest,
    ) -> Result<Vec<ParcelZoning>, ApiError> {
        self.unit_zoning_for(request)
    }
}
