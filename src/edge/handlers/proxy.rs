//! Guard middleware and the reverse proxy to the portal upstream.

use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Request},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    edge::EdgeState,
    guard::{Action, SessionCookies},
};

/// Largest request body the proxy will buffer before forwarding.
const MAX_FORWARD_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Route-guard middleware. Runs on every request before anything else;
/// `/health` is edge infrastructure and skips the policy, and `POST
/// /signout` is always honored so a half-signed-in browser (TFA cookie
/// only) can still bail out.
pub async fn guard(
    Extension(state): Extension<Arc<EdgeState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == "/health" || (request.method() == Method::POST && path == "/signout") {
        return next.run(request).await;
    }

    let cookies = SessionCookies::from_headers(request.headers());
    match state.guard.decide(path, &cookies) {
        Action::Allow => next.run(request).await,
        Action::RedirectTo(location) => {
            debug!(path, location, "Route guard redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// Forwards an allowed request to the portal upstream.
pub async fn forward(Extension(state): Extension<Arc<EdgeState>>, request: Request) -> Response {
    match forward_inner(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            error!("Upstream proxy failure: {err}");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

async fn forward_inner(state: &EdgeState, request: Request) -> anyhow::Result<Response> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), ToString::to_string);
    let url = format!(
        "{}{path_and_query}",
        state.upstream.as_str().trim_end_matches('/')
    );

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORWARD_BODY_BYTES).await?;

    let mut upstream_request = state.http.request(parts.method, url);
    for (name, value) in &parts.headers {
        if is_hop_by_hop(name.as_str()) || name == header::HOST {
            continue;
        }
        upstream_request = upstream_request.header(name.clone(), value.clone());
    }

    let upstream_response = upstream_request.body(bytes).send().await?;

    let status = upstream_response.status();
    let headers = upstream_response.headers().clone();
    let body = upstream_response.bytes().await?;

    let mut response = Response::builder().status(status);
    if let Some(response_headers) = response.headers_mut() {
        copy_response_headers(&headers, response_headers);
    }
    Ok(response.body(Body::from(body))?)
}

fn copy_response_headers(upstream: &HeaderMap, target: &mut HeaderMap) {
    for (name, value) in upstream {
        // The body is re-buffered, so framing headers do not carry over.
        if is_hop_by_hop(name.as_str()) || name == header::CONTENT_LENGTH {
            continue;
        }
        target.append(name, value.clone());
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
