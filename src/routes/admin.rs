use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Category and location management. Handlers reject non-admin callers with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/categories
        .route("/categories", post(handlers::create_category))
        // PUT/DELETE /admin/categories/{slug}
        // Publishing or hiding a category immediately changes which posts are public.
        .route(
            "/categories/{slug}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // POST /admin/locations
        .route("/locations", post(handlers::create_location))
        // PUT/DELETE /admin/locations/{id}
        .route(
            "/locations/{id}",
            put(handlers::update_location).delete(handlers::delete_location),
        )
}
