use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with every scene branching endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/scenes", post(handler::create_scene))
        .route("/v1/scenes/:scene_id", get(handler::get_scene))
        .route(
            "/v1/scenes/:scene_id/branches",
            post(handler::create_branch).get(handler::list_branches),
        )
        .route("/v1/scenes/:scene_id/reconcile", get(handler::reconcile))
        .route(
            "/v1/branches/:id",
            get(handler::get_branch).delete(handler::delete_branch),
        )
        .route("/v1/branches/:id/archive", post(handler::archive_branch))
        .route("/v1/branches/:id/merge", post(handler::merge_branch))
        .route("/v1/branches/:id/diff", get(handler::diff_branch))
        .route(
            "/v1/branches/:id/snapshots",
            post(handler::create_snapshot).get(handler::list_snapshots),
        )
        .route(
            "/v1/branches/:id/elements",
            post(handler::create_element).get(handler::list_elements),
        )
        .route("/v1/snapshots/:id", get(handler::get_snapshot))
        .route("/v1/snapshots/:id/restore", post(handler::restore_snapshot))
        .route("/v1/jobs/:id", get(handler::get_job))
        .route(
            "/v1/elements/:id",
            put(handler::update_element).delete(handler::delete_element),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
