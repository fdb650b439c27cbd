//! Router assembly

use crate::handlers;
use crate::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes());

    // Built client, with index.html for any path the API does not claim
    if let Some(static_dir) = state.config.static_dir.as_deref() {
        info!("Serving static files from: {}", static_dir);
        let index_path = PathBuf::from(static_dir).join("index.html");
        app = app.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index_path)));
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::categories::list).post(handlers::categories::create),
        )
        .route(
            "/categories/:id",
            patch(handlers::categories::update).delete(handlers::categories::delete),
        )
        .route(
            "/bookmarks",
            get(handlers::bookmarks::list).post(handlers::bookmarks::create),
        )
        .route(
            "/bookmarks/category/:category_id",
            get(handlers::bookmarks::list_by_category),
        )
        .route(
            "/bookmarks/section/:section_id",
            get(handlers::bookmarks::list_by_section),
        )
        .route(
            "/bookmarks/:id",
            patch(handlers::bookmarks::update).delete(handlers::bookmarks::delete),
        )
        .route("/bookmarks/:id/visit", post(handlers::bookmarks::visit))
        .route(
            "/sections",
            get(handlers::sections::list).post(handlers::sections::create),
        )
        .route(
            "/sections/:id",
            patch(handlers::sections::update).delete(handlers::sections::delete),
        )
        .route("/achievements", get(handlers::achievements::list))
        .route("/achievements/check", get(handlers::achievements::check))
        .route("/users/me", get(handlers::users::me))
        .route("/embed-check", get(handlers::embed::check))
        .route("/proxy", get(handlers::proxy::proxy))
}
