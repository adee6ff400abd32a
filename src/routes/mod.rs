pub mod assets;
pub mod auth;
pub mod core;
pub mod follow;
pub mod posts;

use axum::handler::HandlerWithoutStateExt;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::csrf;
use crate::state::AppState;

/// The full application: pages, auth, static assets and uploaded media.
pub fn app(state: AppState) -> Router {
    let media = ServeDir::new(state.config.media_path())
        .not_found_service(core::missing_file.into_service());

    Router::new()
        .merge(posts::router())
        .merge(follow::router())
        .merge(auth::router())
        .route("/assets/{*path}", get(assets::serve))
        .nest_service("/media", media)
        .fallback(core::not_found)
        .layer(middleware::from_fn(csrf::verify_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
