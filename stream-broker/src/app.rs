//! Router assembly: route wiring, per-tier rate limiting, and CORS.

use axum::Router;
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use sandbox_runtime::OrchestratorConfig;
use sandbox_runtime::rate_limit::{read_rate_limit, write_rate_limit};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Build the full StreamBroker router: `/investigate`, `/interrupt`,
/// `/answer` behind the write-tier limiter, `/proxy/files/{token}` behind
/// the read-tier limiter, and `/health`, `/metrics` unlimited.
pub fn build_router() -> Router {
    let mutating = Router::new()
        .route("/investigate", post(handlers::investigate::investigate))
        .route("/interrupt", post(handlers::interrupt::interrupt))
        .route("/answer", post(handlers::answer::answer))
        .route_layer(middleware::from_fn(write_rate_limit));

    let read_only = Router::new()
        .route("/proxy/files/{token}", get(handlers::proxy::proxy_file))
        .route_layer(middleware::from_fn(read_rate_limit));

    let unmetered = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics_handler::metrics));

    Router::new()
        .merge(mutating)
        .merge(read_only)
        .merge(unmetered)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Permissive in local/dev when `CORS_ALLOWED_ORIGINS` is unset; an explicit
/// allow-list with credentials when it is set.
fn build_cors_layer() -> CorsLayer {
    let config = OrchestratorConfig::load();
    match &config.cors_allowed_origins {
        Some(origins) => {
            let parsed: Vec<_> = origins.split(',').filter_map(|origin| origin.trim().parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(AllowHeaders::mirror_request())
        }
        None => CorsLayer::permissive(),
    }
}
