//! Edge server: router wiring, guard middleware placement, and the listener.
//!
//! The router owns three local endpoints (`/signin`, `/tfa`, `/signout`) plus
//! `/health`; every other request is proxied to the portal upstream. The
//! route guard runs as a middleware layer on the whole router so each
//! navigation is gated before anything else happens.

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

use crate::{guard::GuardConfig, session::SessionStore};

pub mod handlers;

/// Cookie attributes shared by the auth handlers.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Only mark cookies `Secure` when the portal is served over HTTPS.
    pub secure: bool,
    /// Session cookie lifetime without remember-me.
    pub session_ttl_seconds: u64,
}

/// Shared state for the edge handlers and the guard middleware.
pub struct EdgeState {
    pub guard: GuardConfig,
    pub store: SessionStore,
    pub upstream: Url,
    pub http: reqwest::Client,
    pub cookies: CookiePolicy,
}

/// Build the edge router around the shared state.
pub fn app(state: Arc<EdgeState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health).options(handlers::health::health))
        .route(
            "/signin",
            post(handlers::auth::sign_in).fallback(handlers::proxy::forward),
        )
        .route(
            "/tfa",
            post(handlers::auth::verify_second_factor).fallback(handlers::proxy::forward),
        )
        .route(
            "/signout",
            post(handlers::auth::sign_out).fallback(handlers::proxy::forward),
        )
        .route(
            "/signup",
            post(handlers::auth::sign_up).fallback(handlers::proxy::forward),
        )
        .fallback(handlers::proxy::forward)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state))
                .layer(middleware::from_fn(handlers::proxy::guard)),
        )
}

/// Start the edge server.
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16, state: Arc<EdgeState>) -> Result<()> {
    let app = app(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
