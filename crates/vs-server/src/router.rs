//! Axum router construction.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
///
/// `GET` routes also answer `HEAD`.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/video", get(routes::video::stream_video))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(ctx)
}
