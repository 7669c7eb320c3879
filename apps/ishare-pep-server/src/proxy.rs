//! Enforcing reverse proxy.
//!
//! Every request is authorized against the PEP first. Denied requests get the
//! decision's status with a `{"error": <reason code>}` body; permitted ones are
//! forwarded to the backend unchanged and its answer is relayed verbatim.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header, request::Parts};
use axum::response::{IntoResponse, Response};
use ishare_pep_sdk::{DenyReason, InboundRequest, PepGatewayClient};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::config::BackendConfig;

/// Header carrying the token as issued by the iSHARE identity flow.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared state for the proxy handler.
pub struct ProxyState {
    pep: Arc<dyn PepGatewayClient>,
    client: reqwest::Client,
    backend: Url,
    max_body_bytes: usize,
}

impl ProxyState {
    /// # Errors
    ///
    /// Returns an error if the backend URL is invalid or the HTTP client cannot be built.
    pub fn new(
        pep: Arc<dyn PepGatewayClient>,
        backend: &BackendConfig,
        max_body_bytes: usize,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(backend.timeout())
            .build()?;
        Ok(Self {
            pep,
            client,
            backend: backend.base_url()?,
            max_body_bytes,
        })
    }
}

/// Router sending every method and path through [`proxy`].
#[must_use]
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(proxy).with_state(state)
}

#[tracing::instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
async fn proxy(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let Ok(body) = axum::body::to_bytes(body, state.max_body_bytes).await else {
        debug!(limit = state.max_body_bytes, "request body rejected");
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large");
    };

    let mut inbound =
        InboundRequest::new(parts.method.clone(), parts.uri.path()).with_body(body.to_vec());
    if let Some(query) = parts.uri.query() {
        inbound = inbound.with_query(query);
    }

    let decision = state
        .pep
        .authorize(extract_token(&parts.headers), &inbound)
        .await;
    if !decision.allow {
        let status = StatusCode::from_u16(decision.http_status).unwrap_or(StatusCode::UNAUTHORIZED);
        let code = decision.reason.map_or("denied", DenyReason::code);
        return error_response(status, code);
    }

    match forward(&state, &parts, body).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "backend request failed");
            error_response(StatusCode::BAD_GATEWAY, "backend_unavailable")
        }
    }
}

async fn forward(state: &ProxyState, parts: &Parts, body: Bytes) -> Result<Response, reqwest::Error> {
    let mut url = state.backend.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let upstream = state
        .client
        .request(parts.method.clone(), url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut upstream_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut upstream_headers);
    upstream_headers.remove(header::CONTENT_LENGTH);
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = upstream_headers;
    Ok(response)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, axum::Json(json!({ "error": code }))).into_response()
}

/// Token from `X-Auth-Token`, falling back to `Authorization: Bearer`.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}
