//! HTTP front door for cart processes.
//!
//! Maps REST calls onto the [`CartRuntime`]: creating a cart starts a
//! process, mutations become signals, and reads are queries. Requests are
//! traced with `tower-http` and counters are exported for Prometheus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use activities::{InMemoryNotifier, InMemoryPaymentGateway};
use axum::Router;
use axum::routing::{get, post, put};
use cart::Catalog;
use journal::{InMemoryJournal, Journal};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{CartRuntime, ProcessOptions};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(runtime: CartRuntime, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", get(routes::products::list))
        .route("/cart", post(routes::carts::create))
        .route("/cart/{id}", get(routes::carts::get))
        .route("/cart/{id}/status", get(routes::carts::status))
        .route("/cart/{id}/add", put(routes::carts::add))
        .route("/cart/{id}/remove", put(routes::carts::remove))
        .route("/cart/{id}/email", put(routes::carts::email))
        .route("/cart/{id}/checkout", put(routes::carts::checkout))
        .fallback(routes::carts::not_found)
        .with_state(runtime)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates a runtime over `journal` with the default catalog and in-memory
/// payment and notification tasks.
pub fn create_runtime(journal: Arc<dyn Journal>, options: ProcessOptions) -> CartRuntime {
    CartRuntime::new(
        journal,
        Arc::new(Catalog::default()),
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(InMemoryNotifier::new()),
        options,
    )
}

/// Creates a runtime that keeps everything in memory.
pub fn create_default_runtime() -> CartRuntime {
    create_runtime(Arc::new(InMemoryJournal::new()), ProcessOptions::default())
}
