//! HTTP API for the bookstore catalog and cart reservations.
//!
//! Provides REST endpoints for books and carts over either store backend,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::BookstoreStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookstoreStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health::<S>))
        .route(
            "/books",
            get(routes::books::list::<S>).post(routes::books::create::<S>),
        )
        .route("/books/search", get(routes::books::search::<S>))
        .route("/books/batch", post(routes::books::create_batch::<S>))
        .route(
            "/books/{id}",
            get(routes::books::get::<S>).delete(routes::books::delete::<S>),
        )
        .route(
            "/users/{user_id}/cart",
            get(routes::carts::contents::<S>).post(routes::carts::open::<S>),
        )
        .route(
            "/users/{user_id}/cart/items",
            post(routes::carts::add_item::<S>).delete(routes::carts::clear::<S>),
        )
        .route(
            "/cart/lines/{line_id}",
            delete(routes::carts::remove_line::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
