use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::coffee::Store;
use crate::handlers;

/// Format latency in human-readable units
fn format_latency(duration: std::time::Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else {
        format!("{:.1}s", micros as f64 / 1_000_000.0)
    }
}

pub struct AppState {
    pub store: Store,
    pub app_version: String,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Store::in_memory())
    }
}

pub fn create_app(state: SharedAppState) -> Router {
    Router::new()
        .route(
            "/api/coffees",
            get(handlers::list_coffees).post(handlers::create_coffee),
        )
        .route(
            "/api/coffees/:id",
            get(handlers::get_coffee)
                .put(handlers::update_coffee)
                .delete(handlers::delete_coffee),
        )
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    static REQUEST_ID: AtomicU64 = AtomicU64::new(1);
                    let request_id_num = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
                    let generator = block_id::BlockId::new(
                        block_id::Alphabet::alphanumeric(),
                        1234,
                        5,
                    );
                    let request_id = generator
                        .encode_string(request_id_num)
                        .unwrap_or_else(|| request_id_num.to_string());
                    tracing::info_span!(
                        "request",
                        id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &Span| {
                    tracing::info!("-> {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &Span| {
                        tracing::info!(
                            "<- {} latency={}",
                            response.status().as_u16(),
                            format_latency(latency)
                        );
                    },
                ),
        )
        .layer(CompressionLayer::new())
}
