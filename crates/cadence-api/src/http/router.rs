//! Axum router configuration with middleware.
//!
//! Webhooks live at the root (`/webhooks/{token}`) because their URLs are
//! handed to third parties; everything else is under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/workflows/{id}/run", post(handlers::workflow::run_workflow))
        .route(
            "/workflows/{id}/executions",
            get(handlers::workflow::list_executions),
        )
        .route(
            "/executions/{id}/logs",
            get(handlers::workflow::execution_logs),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/webhooks/{token}", post(handlers::webhook::receive_webhook))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness probe.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
