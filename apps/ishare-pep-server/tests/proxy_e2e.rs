#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Proxy behaviour against a mocked backend data service.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use ishare_pep::PepConfig;
use ishare_pep::test_support::{
    ISSUER, claims_for, mint_token, now_epoch, sample_evidence, test_config,
};
use ishare_pep_server::config::{AppConfig, BackendConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app_for(backend: &MockServer) -> axum::Router {
    let cfg = AppConfig {
        backend: BackendConfig {
            scheme: "http".to_owned(),
            host: backend.host(),
            port: backend.port(),
            timeout_ms: 2000,
        },
        max_body_bytes: 4096,
        pep: PepConfig {
            trusted_issuers: vec![ISSUER.to_owned()],
            ..test_config()
        },
        ..AppConfig::default()
    };
    let (app, _svc) = ishare_pep_server::build(&cfg).unwrap();
    app
}

fn token() -> String {
    mint_token(&claims_for(&sample_evidence(now_epoch())))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn permitted_request_is_forwarded_verbatim() {
    let backend = MockServer::start_async().await;
    let mock = backend
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ngsi-ld/v1/entities/urn:ngsi-ld:SoilSensor:1111")
                .query_param("type", "SoilSensor");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "id": "urn:ngsi-ld:SoilSensor:1111", "type": "SoilSensor" }));
        })
        .await;

    let response = app_for(&backend)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ngsi-ld/v1/entities/urn:ngsi-ld:SoilSensor:1111?type=SoilSensor")
                .header("X-Auth-Token", token())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "id": "urn:ngsi-ld:SoilSensor:1111", "type": "SoilSensor" })
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn backend_status_is_relayed() {
    let backend = MockServer::start_async().await;
    backend
        .mock_async(|when, then| {
            when.method(PATCH).path("/ngsi-ld/v1/entityOperations/upsert");
            then.status(204);
        })
        .await;

    let body = json!([
        { "id": "urn:ngsi-ld:TemperatureSensor:002", "type": "TemperatureSensor" },
        { "id": "urn:ngsi-ld:TemperatureSensor:003", "type": "TemperatureSensor" },
    ]);
    let response = app_for(&backend)
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/ngsi-ld/v1/entityOperations/upsert")
                .header("Authorization", format!("Bearer {}", token()))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn denied_request_never_reaches_backend() {
    // No mocks registered: a forwarded request would come back as 404.
    let backend = MockServer::start_async().await;

    let response = app_for(&backend)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ngsi-ld/v1/entities/urn:ngsi-ld:Tractor:1111?type=Tractor")
                .header("X-Auth-Token", token())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "error": "not_permitted" }));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let backend = MockServer::start_async().await;

    let response = app_for(&backend)
        .oneshot(
            Request::builder()
                .uri("/ngsi-ld/v1/entities/urn:ngsi-ld:SoilSensor:1111?type=SoilSensor")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({ "error": "missing_token" }));
}

#[tokio::test]
async fn public_path_is_forwarded_without_token() {
    let backend = MockServer::start_async().await;
    let mock = backend
        .mock_async(|when, then| {
            when.method(GET).path("/public");
            then.status(200).body("ok");
        })
        .await;

    let response = app_for(&backend)
        .oneshot(Request::builder().uri("/public").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let backend = MockServer::start_async().await;

    let response = app_for(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ngsi-ld/v1/entities")
                .header("X-Auth-Token", token())
                .body(Body::from(vec![b'x'; 8192]))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unreachable_backend_is_bad_gateway() {
    let cfg = AppConfig {
        backend: BackendConfig {
            scheme: "http".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: 1,
            timeout_ms: 500,
        },
        pep: test_config(),
        ..AppConfig::default()
    };
    let (app, _svc) = ishare_pep_server::build(&cfg).unwrap();

    let response = app
        .oneshot(Request::builder().uri("/public").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "backend_unavailable" })
    );
}

#[tokio::test]
async fn dot_segments_never_reach_backend() {
    // No mocks registered: a forwarded request would come back as 404.
    let backend = MockServer::start_async().await;
    let cfg = AppConfig {
        backend: BackendConfig {
            scheme: "http".to_owned(),
            host: backend.host(),
            port: backend.port(),
            timeout_ms: 2000,
        },
        pep: PepConfig {
            public_paths: vec!["/public/{*rest}".to_owned()],
            ..test_config()
        },
        ..AppConfig::default()
    };
    let (app, _svc) = ishare_pep_server::build(&cfg).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/public/../ngsi-ld/v1/entities/urn:ngsi-ld:Tractor:1111")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "unrecognized_request" })
    );
}
