// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP client for the cadmap REST collaborators.
//!
//! [`ParcelApi`] is the async seam hosts use to run the engine's
//! [`ApiRequest`]s; [`HttpParcelApi`] implements it over `reqwest`, and
//! [`dispatch`] turns a request into the matching [`ApiResponse`].

use std::future::Future;
use std::time::Duration;

use cadmap_engine::{
    parse_catalog, ApiRequest, ApiResponse, CatalogEntry, LayerRegistry, ParcelRef, ParcelZoning,
    RemoteError, UnionRequest, UnionResponse, UnitZoningRequest, Zoning, PARCEL_LAYER_ID,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST call failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Base URL or path could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Connection, timeout or body transfer failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx response.
    #[error("http {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Body did not match the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Async access to the layer catalog, union and zoning endpoints.
pub trait ParcelApi {
    /// `GET /layers`.
    fn fetch_catalog(&self) -> impl Future<Output = Result<Vec<CatalogEntry>, ApiError>> + Send;

    /// `GET /zoning/{municipality}/{section}/{number}`; `Ok(None)` on 404.
    fn lookup_zoning(
        &self,
        parcel: &ParcelRef,
    ) -> impl Future<Output = Result<Option<Zoning>, ApiError>> + Send;

    /// `POST /parcel/unit-geometry`.
    fn resolve_union(
        &self,
        request: &UnionRequest,
    ) -> impl Future<Output = Result<UnionResponse, ApiError>> + Send;

    /// `POST /zoning/unit`.
    fn lookup_unit_zoning(
        &self,
        request: &UnitZoningRequest,
    ) -> impl Future<Output = Result<Vec<ParcelZoning>, ApiError>> + Send;
}

/// Run one engine request and wrap the outcome for [`cadmap_engine::MapSession::on_api_response`].
pub async fn dispatch<A: ParcelApi + Sync>(api: &A, request: ApiRequest) -> ApiResponse {
    match request {
        ApiRequest::Zoning { token, parcel } => ApiResponse::Zoning {
            token,
            result: api.lookup_zoning(&parcel).await.map_err(RemoteError::new),
        },
        ApiRequest::Union { token, request } => ApiResponse::Union {
            token,
            result: api.resolve_union(&request).await.map_err(RemoteError::new),
        },
        ApiRequest::UnitZoning { token, request } => ApiResponse::UnitZoning {
            token,
            result: api
                .lookup_unit_zoning(&request)
                .await
                .map_err(RemoteError::new),
        },
    }
}

/// Fetch the catalog and build a registry with tiles under `base`.
pub async fn fetch_registry<A: ParcelApi + Sync>(
    api: &A,
    base: &str,
) -> Result<LayerRegistry, ApiError> {
    let entries = api.fetch_catalog().await?;
    Ok(LayerRegistry::from_catalog(base, &entries, PARCEL_LAYER_ID))
}

/// [`ParcelApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpParcelApi {
    client: Client,
    base: Url,
}

impl HttpParcelApi {
    /// Client for the API rooted at `base` (e.g. `http://localhost:8000`).
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// API root.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl ParcelApi for HttpParcelApi {
    #[instrument(skip(self), fields(base = %self.base))]
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        let url = self.endpoint(&["layers"])?;
        let raw: Vec<Value> = decode(self.client.get(url).send().await?).await?;
        let entries = parse_catalog(raw);
        debug!(layers = entries.len(), "catalog fetched");
        Ok(entries)
    }

    #[instrument(skip(self, parcel), fields(section = %parcel.section, number = %parcel.number))]
    async fn lookup_zoning(&self, parcel: &ParcelRef) -> Result<Option<Zoning>, ApiError> {
        if !parcel.has_municipality() {
            return Err(ApiError::InvalidUrl(format!(
                "parcel {}/{} has no municipality code",
                parcel.section, parcel.number
            )));
        }
        let url = self.endpoint(&[
            "zoning",
            &parcel.municipality_code,
            &parcel.section,
            &parcel.number,
        ])?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("no zoning for parcel");
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    #[instrument(skip(self, request), fields(parcels = request.parcels.len()))]
    async fn resolve_union(&self, request: &UnionRequest) -> Result<UnionResponse, ApiError> {
        let url = self.endpoint(&["parcel", "unit-geometry"])?;
        decode(self.client.post(url).json(request).send().await?).await
    }

    #[instrument(skip(self, request), fields(parcels = request.parcels.len()))]
    async fn lookup_unit_zoning(
        &self,
        request: &UnitZoningRequest,
    ) -> Result<Vec<ParcelZoning>, ApiError> {
        let url = self.endpoint(&["zoning", "unit"])?;
        decode(self.client.post(url).json(request).send().await?).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn endpoints_keep_the_base_path() {
        let api = HttpParcelApi::new("http://localhost:8000/api/", DEFAULT_TIMEOUT).unwrap();
        let url = api.endpoint(&["zoning", "33063", "AC", "12"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/zoning/33063/AC/12");
    }

    #[test]
    fn segments_are_escaped() {
        let api = HttpParcelApi::new("http://localhost:8000", DEFAULT_TIMEOUT).unwrap();
        let url = api.endpoint(&["zoning", "33063", "A B", "12"]).unwrap();
        assert_eq!(url.path(), "/zoning/33063/A%20B/12");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            HttpParcelApi::new("mailto:someone@example.com", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpParcelApi::new("not a url", DEFAULT_TIMEOUT),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
