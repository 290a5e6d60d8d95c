// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
//! HTTP client against a local axum server.

use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use cadmap_api_client::{dispatch, fetch_registry, ApiError, HttpParcelApi, ParcelApi};
use cadmap_engine::{
    ApiRequest, ApiResponse, ParcelId, ParcelRef, UnionRequest, UnitZoningRequest,
};
use serde_json::{json, Value};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn app() -> Router {
    Router::new()
        .route(
            "/layers",
            get(|| async {
                Json(json!([
                    {"id": "parcelles", "nom": "Parcelles", "type": "fill", "minzoom": 14, "maxzoom": 19},
                    {"id": "zonage_plu", "nom": "Zonage PLU", "type": "fill",
                     "attribut_map": "typezone", "minzoom": 11, "maxzoom": 19},
                    {"id": "labels", "nom": "Labels", "type": "heatmap", "minzoom": 0, "maxzoom": 19},
                    {"id": "casse", "nom": "Cassé", "type": "fill", "minzoom": "bas", "maxzoom": 19}
                ]))
            }),
        )
        .route(
            "/zoning/{code}/{section}/{number}",
            get(|Path((code, section, number)): Path<(String, String, String)>| async move {
                if code == "33063" && section == "AC" && number == "12" {
                    Ok(Json(json!({"typezone": "U", "label": "UA", "longLabel": "Zone urbaine"})))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        )
        .route(
            "/parcel/unit-geometry",
            post(|Json(body): Json<Value>| async move {
                if body["parcels"].as_array().map_or(0, Vec::len) < 2 {
                    return Err((StatusCode::UNPROCESSABLE_ENTITY, "need two parcels"));
                }
                Ok(Json(json!({
                    "geometry": {"type": "Polygon", "coordinates": [[[-0.58, 44.84], [-0.57, 44.85], [-0.58, 44.84]]]},
                    "properties": {"municipalityCode": body["municipalityCode"], "municipalityName": "Bordeaux"}
                })))
            }),
        )
        .route(
            "/zoning/unit",
            post(|Json(body): Json<Value>| async move {
                let parcels = body["parcels"].as_array().cloned().unwrap_or_default();
                let out: Vec<Value> = parcels
                    .iter()
                    .map(|p| json!({"section": p["section"], "number": p["number"], "typezone": "N"}))
                    .collect();
                Json(Value::Array(out))
            }),
        )
}

fn two_parcels() -> Vec<ParcelId> {
    vec![
        ParcelId {
            section: "AC".into(),
            number: "12".into(),
        },
        ParcelId {
            section: "AC".into(),
            number: "45".into(),
        },
    ]
}

#[tokio::test]
async fn catalog_builds_a_registry() {
    let base = serve(app()).await;
    let api = HttpParcelApi::new(&base, Duration::from_secs(5)).unwrap();
    let registry = fetch_registry(&api, &base).await.unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.by_id("labels").is_none());
    assert!(registry.by_id("casse").is_none());
    assert!(registry.by_id("parcelles").unwrap().selectable);
}

#[tokio::test]
async fn zoning_lookup_maps_404_to_none() {
    let base = serve(app()).await;
    let api = HttpParcelApi::new(&base, Duration::from_secs(5)).unwrap();
    let found = api
        .lookup_zoning(&ParcelRef::new("AC", "12", "33063"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.long_label.as_deref(), Some("Zone urbaine"));
    let missing = api
        .lookup_zoning(&ParcelRef::new("ZZ", "1", "33063"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn union_failure_reports_status_and_body() {
    let base = serve(app()).await;
    let api = HttpParcelApi::new(&base, Duration::from_secs(5)).unwrap();
    let err = api
        .resolve_union(&UnionRequest {
            municipality_code: Some("33063".into()),
            parcels: two_parcels()[..1].to_vec(),
            name: None,
        })
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "need two parcels");
        }
        other => unreachable!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn dispatch_carries_the_token() {
    let base = serve(app()).await;
    let api = HttpParcelApi::new(&base, Duration::from_secs(5)).unwrap();
    let response = dispatch(
        &api,
        ApiRequest::Union {
            token: 7,
            request: UnionRequest {
                municipality_code: Some("33063".into()),
                parcels: two_parcels(),
                name: Some("Lot A".into()),
            },
        },
    )
    .await;
    let ApiResponse::Union { token, result } = response else {
        unreachable!("wrong response kind");
    };
    assert_eq!(token, 7);
    let union = result.unwrap();
    assert_eq!(union.properties.municipality_code, "33063");
    assert_eq!(union.properties.municipality_name.as_deref(), Some("Bordeaux"));

    let response = dispatch(
        &api,
        ApiRequest::UnitZoning {
            token: 8,
            request: UnitZoningRequest {
                municipality_code: "33063".into(),
                parcels: two_parcels(),
            },
        },
    )
    .await;
    let ApiResponse::UnitZoning { token, result } = response else {
        unreachable!("wrong response kind");
    };
    assert_eq!(token, 8);
    let entries = result.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].zoning.typezone.as_deref(), Some("N"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let api = HttpParcelApi::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let response = dispatch(
        &api,
        ApiRequest::Zoning {
            token: 1,
            parcel: ParcelRef::new("AC", "12", "33063"),
        },
    )
    .await;
    assert!(matches!(
        response,
        ApiResponse::Zoning { token: 1, result: Err(_) }
    ));
}
