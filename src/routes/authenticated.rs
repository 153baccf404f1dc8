use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes that need a resolved `AuthUser`. Every post and comment mutation
/// runs the ownership gate in its handler; a caller who is not the author is
/// redirected to the post's detail view.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT /me
        // The caller's own profile; PUT changes the username.
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // POST /posts
        // Creates a post authored by the caller.
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Author-only edit and delete. Deletion cascades to comments.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{id}/comments
        // Comments on a post the caller can see.
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{id}/comments/{comment_id}
        // Author-only, scoped to the parent post.
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        // POST /upload/image
        // Presigned upload URL for a post image.
        .route("/upload/image", post(handlers::create_image_upload))
}
