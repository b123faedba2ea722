use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, play, tracks};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config().server.public_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/dispatcher/status", get(handlers::dispatcher_status))
        // Tracks
        .route("/queue-track", post(tracks::queue_track))
        .route(
            "/check-tracks",
            post(tracks::check_tracks).get(tracks::check_tracks_query),
        )
        .route("/play-track", get(play::play_track_missing_id))
        .route("/play-track/", get(play::play_track_missing_id))
        .route("/play-track/{track_id}", get(play::play_track))
        // Jobs
        .route(
            "/jobs/{track_id}",
            get(handlers::get_job).delete(handlers::delete_job),
        );

    let router = Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve static files for anything the API does not handle
    match public_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
