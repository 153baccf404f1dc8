use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous viewers. Handlers resolve an optional `Viewer`
/// and apply the visibility policy themselves: feeds use the strict public
/// filter, while detail and profile views let authors see their own hidden posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Signs up with the identity provider and mirrors a local profile.
        .route("/register", post(handlers::register_user))
        // GET /posts?page=
        // Home feed of publicly visible posts, newest first.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Post detail with comments. 404 for hidden posts unless the viewer wrote it.
        .route("/posts/{id}", get(handlers::post_detail))
        // GET /category/{slug}?page=
        // Posts of one published category. Unpublished categories are 404.
        .route("/category/{slug}", get(handlers::category_posts))
        // GET /profile/{username}?page=
        // A user's posts; the owner also sees scheduled and unpublished ones.
        .route("/profile/{username}", get(handlers::profile))
        // GET /categories, GET /locations
        // Published reference data for post forms.
        .route("/categories", get(handlers::list_categories))
        .route("/locations", get(handlers::list_locations))
}
