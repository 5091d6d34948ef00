//! HTTP surface: routes, the governance middleware, and server startup.
//!
//! Every request passes through [`govern`] before any handler runs. The
//! middleware asks the pipeline for a decision, attaches the authenticated
//! identity for handlers, and writes the access record once the response is
//! ready. Handlers never re-check tokens or roles.

use crate::gate::{
    request::{AuthenticatedIdentity, Decision, Rejection, RequestDescriptor},
    Pipeline,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, options},
    Extension, Json, Router,
};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::{net::TcpListener, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub(crate) mod handlers;
mod openapi;

pub use openapi::openapi;

/// Identity attached by [`govern`] for handlers to consume. Public routes may
/// carry `None`.
#[derive(Clone)]
pub(crate) struct RequestIdentity(pub Option<AuthenticatedIdentity>);

/// Build the application router with the full middleware stack.
#[must_use]
pub fn app(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        // headers a browser preflights for: JSON bodies and bearer tokens
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        // allow the verbs the API serves when accessing the resource
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        // allow requests from any origin
        .allow_origin(Any);

    // Build the router from OpenAPI-wired routes, then extend it with non-doc
    // routes like `/`, `/openapi.json`, and preflight-only `OPTIONS /health`.
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router
        .route("/", get(handlers::root::root))
        .route("/health", options(handlers::health::health))
        .route("/openapi.json", get(openapi::serve))
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
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                .layer(Extension(pipeline))
                .layer(middleware::from_fn(govern)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, pipeline: Arc<Pipeline>) -> Result<()> {
    // Shut down gracefully on SIGINT so in-flight requests still complete.
    let (tx, mut rx) = mpsc::unbounded_channel();
    shutdown_on_signal(tx);

    let app = app(pipeline);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        rx.recv().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn shutdown_on_signal(tx: mpsc::UnboundedSender<()>) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
            return;
        }
        let _ = tx.send(());
    });
}

/// Governance middleware: decide, attach identity, record the access.
async fn govern(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let descriptor = RequestDescriptor::from_parts(
        request.method().clone(),
        request.uri().path(),
        request.headers(),
        peer.as_deref(),
    );
    let context = descriptor.audit_context();

    match pipeline.admit(&descriptor) {
        Decision::Allowed(identity) => {
            let actor = identity.as_ref().map(|identity| identity.subject.clone());
            request.extensions_mut().insert(RequestIdentity(identity));
            request.extensions_mut().insert(context.clone());
            let response = next.run(request).await;
            pipeline.record_access(
                &context,
                actor.as_deref(),
                response.status().as_u16(),
                started.elapsed().as_millis(),
            );
            response
        }
        Decision::Rejected(rejection) => {
            let response = rejection_response(&rejection);
            pipeline.record_access(
                &context,
                None,
                response.status().as_u16(),
                started.elapsed().as_millis(),
            );
            response
        }
    }
}

/// Map a rejection to its response. Bodies carry the client-safe `Display`
/// string as a JSON error; throttled requests additionally carry retry
/// headers.
pub(crate) fn rejection_response(rejection: &Rejection) -> Response {
    let mut response = (
        rejection.status(),
        Json(serde_json::json!({ "error": rejection.to_string() })),
    )
        .into_response();

    if let Rejection::RateLimited {
        retry_after_seconds,
        limit_per_minute,
    } = rejection
    {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
            headers.insert("retry-after", value);
        }
        if let Ok(value) = HeaderValue::from_str(&limit_per_minute.to_string()) {
            headers.insert("x-ratelimit-limit", value);
        }
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    }

    response
}

fn make_span(request: &axum::http::Request<Body>) -> Span {
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
