use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{attach_request_id, span_for_request};
use crate::state::AppState;

pub mod admin;
pub mod import;
pub mod movies;
pub mod ratings;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(span_for_request),
        )
        // outermost so the trace span can pick the id up
        .layer(axum::middleware::from_fn(attach_request_id))
        .layer(CorsLayer::permissive())
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog & search
        .route("/movies", get(movies::list))
        .route("/movies/search", get(movies::search))
        .route("/movies/trending", get(movies::trending))
        .route("/movies/discover", get(movies::discover))
        .route("/movies/:id", get(movies::detail))
        // User ratings
        .route("/ratings", post(ratings::upsert))
        .route("/ratings/user/:user_id", get(ratings::list_by_user))
        .route(
            "/ratings/user/:user_id/movie/:movie_id",
            get(ratings::get_one).delete(ratings::remove),
        )
        // Curator ratings
        .route("/admin/ratings", get(admin::list_curator))
        .route("/admin/ratings/external", post(admin::ingest))
        .route("/admin/ratings/:movie_id", axum::routing::delete(admin::remove))
        // Bulk import
        .route("/import/ratings", post(import::import_csv))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
