//! Detect Service - disease detection history over HTTP.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::AppState;

use axum::{
    http::{HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Assemble the full router: the four history operations behind the auth
/// middleware, plus the open health/metrics surface.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/detect", post(handlers::detect))
        .route("/history", get(handlers::list_history))
        .route(
            "/history/:history_id",
            get(handlers::get_history).delete(handlers::delete_history),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(protected)
        .with_state(state.clone())
        // Add metrics middleware
        .layer(from_fn(middleware::metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<HeaderValue>>(),
                )
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        )
}
