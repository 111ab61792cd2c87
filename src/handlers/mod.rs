pub mod health;
pub mod process;
pub mod results;

pub use health::*;
pub use process::*;
pub use results::*;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{admission_middleware, logging_middleware};
use crate::state::AppState;

/// Headroom for multipart boundaries and the small text fields.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size_bytes() + FORM_OVERHEAD_BYTES;

    let pipeline_routes = Router::new()
        .route("/api/v1/summarize", post(summarize_handler))
        .route("/api/v1/translate", post(translate_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/api/v1/results/:result_id", get(result_handler))
        .route("/api/v1/download/:artifact_id", get(download_handler))
        .merge(pipeline_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(axum::middleware::from_fn(logging_middleware)),
        )
        .with_state(state)
}
