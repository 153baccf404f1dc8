use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, Viewer},
    error::{ApiError, FieldErrors},
    models::{
        Category, CategoryPage, Comment, CommentRequest, CreateCategoryRequest,
        CreateLocationRequest, CreatePostRequest, ImageUploadRequest, ImageUploadResponse,
        Location, Post, PostDetail, ProfilePage, RegisterUserRequest, UpdateCategoryRequest,
        UpdateLocationRequest, UpdatePostRequest, UpdateProfileRequest, User, UserProfile,
    },
    pagination::{Page, PageQuery, paginate},
    policy::{self, post_detail_url},
    repository::PostQuery,
    storage,
};

/// Minimal view of the identity provider's signup response.
#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

// --- Shared helpers ---

fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Adds field errors for category/location ids that do not exist.
async fn check_references(
    state: &AppState,
    category_id: Option<i64>,
    location_id: Option<i64>,
    errors: &mut FieldErrors,
) -> Result<(), ApiError> {
    if let Some(id) = category_id {
        if state.repo.get_category(id).await?.is_none() {
            errors.add("category_id", "Select a valid category.");
        }
    }
    if let Some(id) = location_id {
        if state.repo.get_location(id).await?.is_none() {
            errors.add("location_id", "Select a valid location.");
        }
    }
    Ok(())
}

/// Image keys must come from this author's own upload URLs.
fn check_image_key(author_id: Uuid, image_key: Option<&str>, errors: &mut FieldErrors) {
    if let Some(key) = image_key {
        if !key.starts_with(&format!("posts/{author_id}/")) || key.contains("..") {
            errors.add("image_key", "Upload the image through /upload/image first.");
        }
    }
}

/// Loads a post the caller may see. Hidden posts of other authors are
/// indistinguishable from missing ones, for mutations as well as reads.
async fn visible_post(state: &AppState, post_id: i64, user: &AuthUser) -> Result<Post, ApiError> {
    policy::require_visible_post(state.repo.get_post(post_id).await?, Some(user.id), Utc::now())
}

// --- Public Handlers ---

/// list_posts
///
/// [Public Route] The home feed: every publicly visible post, newest first.
/// No author exception applies here, even for a logged-in author.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "One page of the feed", body = Page<Post>))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Post>>, ApiError> {
    let now = Utc::now();
    let posts = state.repo.list_posts(&PostQuery::feed(now)).await?;
    let posts = policy::filter_public(posts, now);
    Ok(Json(paginate(posts, page.number(), state.config.posts_per_page)))
}

/// category_posts
///
/// [Public Route] Public posts of one category. An unpublished category is
/// reported as missing, whether or not posts reference it.
#[utoipa::path(
    get,
    path = "/category/{slug}",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category and one page of its posts", body = CategoryPage),
        (status = 404, description = "Missing or unpublished category")
    )
)]
pub async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CategoryPage>, ApiError> {
    let category =
        policy::require_published_category(state.repo.get_category_by_slug(&slug).await?)?;

    let now = Utc::now();
    let posts = state
        .repo
        .list_posts(&PostQuery::category(&category.slug, now))
        .await?;
    let posts = policy::filter_public(posts, now);

    Ok(Json(CategoryPage {
        category,
        posts: paginate(posts, page.number(), state.config.posts_per_page),
    }))
}

/// post_detail
///
/// [Public Route] A post with its comments, oldest first. Hidden posts are
/// only shown to their author; everyone else gets 404.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Missing or hidden")
    )
)]
pub async fn post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = policy::require_visible_post(state.repo.get_post(id).await?, viewer.id(), Utc::now())?;
    let comments = state.repo.list_comments(post.id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// profile
///
/// [Public Route] A user's profile and posts. The owner sees every post they
/// wrote, scheduled and unpublished ones included; others see public posts only.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile", body = ProfilePage),
        (status = 404, description = "No such user")
    )
)]
pub async fn profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ProfilePage>, ApiError> {
    let owner = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    let posts = state.repo.list_posts(&PostQuery::by_author(owner.id)).await?;
    let posts = policy::filter_visible(posts, viewer.id(), Utc::now());

    Ok(Json(ProfilePage {
        profile: UserProfile::public(&owner),
        posts: paginate(posts, page.number(), state.config.posts_per_page),
    }))
}

/// list_categories
///
/// [Public Route] Published categories, for post forms and navigation.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Published categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.repo.list_categories(true).await?))
}

/// list_locations
///
/// [Public Route] Published locations.
#[utoipa::path(
    get,
    path = "/locations",
    responses((status = 200, description = "Published locations", body = [Location]))
)]
pub async fn list_locations(State(state): State<AppState>) -> Result<Json<Vec<Location>>, ApiError> {
    Ok(Json(state.repo.list_locations(true).await?))
}

/// register_user
///
/// [Public Route] Signs the user up with the identity provider, then mirrors
/// the returned id into a local profile. New users always get the `author` role.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Never echo the password back.
    let echo = serde_json::json!({ "email": payload.email, "username": payload.username });
    payload.validate().into_result(&echo)?;

    if state.repo.get_user_by_username(&payload.username).await?.is_some() {
        return Err(ApiError::Conflict("username already taken".to_string()));
    }

    let (Some(auth_url), Some(api_key)) = (&state.config.auth_url, &state.config.auth_api_key)
    else {
        return Err(ApiError::Internal("identity provider is not configured".to_string()));
    };

    let response = reqwest::Client::new()
        .post(format!("{auth_url}/auth/v1/signup"))
        .header("apikey", api_key)
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| ApiError::Internal(format!("signup request failed: {e}")))?;

    if !response.status().is_success() {
        let mut errors = FieldErrors::new();
        errors.add("email", "The identity provider rejected this registration.");
        errors.into_result(&echo)?;
    }

    let signup = response
        .json::<SignupResponse>()
        .await
        .map_err(|e| ApiError::Internal(format!("unreadable signup response: {e}")))?;

    let user = state
        .repo
        .create_user(User {
            id: signup.id,
            username: payload.username,
            role: "author".to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(UserProfile::own(&user))))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's own profile, role included.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(user: AuthUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: user.id,
        username: user.username,
        role: Some(user.role),
    })
}

/// update_me
///
/// [Authenticated Route] Changes the caller's username.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    payload.validate().into_result(&payload)?;
    let updated = state.repo.update_username(user.id, &payload.username).await?;
    Ok(Json(UserProfile::own(&updated)))
}

/// create_post
///
/// [Authenticated Route] Publishes (or schedules) a post authored by the caller.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = payload.validate();
    check_references(&state, payload.category_id, payload.location_id, &mut errors).await?;
    check_image_key(user.id, payload.image_key.as_deref(), &mut errors);
    errors.into_result(&payload)?;

    let post = state.repo.create_post(user.id, payload).await?;
    tracing::info!(post_id = post.id, author = %user.username, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Edits a post. Anyone but the author is redirected to
/// the post's detail view.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let post = visible_post(&state, id, &user).await?;
    policy::ensure_can_mutate(&post, Some(user.id), post_detail_url(post.id))?;

    let mut errors = payload.validate();
    check_references(&state, payload.category_id, payload.location_id, &mut errors).await?;
    check_image_key(user.id, payload.image_key.as_deref(), &mut errors);
    errors.into_result(&payload)?;

    let updated = state
        .repo
        .update_post(id, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    tracing::info!(post_id = id, "post updated");
    Ok(Json(updated))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post and its comments. Anyone but the
/// author is redirected to the post's detail view.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let post = visible_post(&state, id, &user).await?;
    policy::ensure_can_mutate(&post, Some(user.id), post_detail_url(post.id))?;

    if !state.repo.delete_post(id).await? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the caller can see.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Missing or hidden post"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = visible_post(&state, post_id, &user).await?;
    payload.validate().into_result(&payload)?;

    let comment = state.repo.add_comment(post.id, user.id, payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Loads a comment of a post the caller can see.
async fn comment_of_post(
    state: &AppState,
    post_id: i64,
    comment_id: i64,
    user: &AuthUser,
) -> Result<Comment, ApiError> {
    let post = visible_post(state, post_id, user).await?;
    state
        .repo
        .get_comment(comment_id)
        .await?
        .filter(|comment| comment.post_id == post.id)
        .ok_or(ApiError::NotFound)
}

/// update_comment
///
/// [Authenticated Route] Edits a comment. Anyone but its author is redirected
/// to the parent post.
#[utoipa::path(
    put,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let comment = comment_of_post(&state, post_id, comment_id, &user).await?;
    policy::ensure_can_mutate(&comment, Some(user.id), post_detail_url(post_id))?;
    payload.validate().into_result(&payload)?;

    let updated = state
        .repo
        .update_comment(comment.id, payload.text)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// delete_comment
///
/// [Authenticated Route] Deletes a comment. Anyone but its author is
/// redirected to the parent post.
#[utoipa::path(
    delete,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Not the author; redirected to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let comment = comment_of_post(&state, post_id, comment_id, &user).await?;
    policy::ensure_can_mutate(&comment, Some(user.id), post_detail_url(post_id))?;

    if !state.repo.delete_comment(comment.id).await? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// create_image_upload
///
/// [Authenticated Route] Issues a presigned URL for uploading a post image
/// straight to object storage. The URL expires after ten minutes and only
/// accepts the declared `image/*` content type.
#[utoipa::path(
    post,
    path = "/upload/image",
    request_body = ImageUploadRequest,
    responses(
        (status = 200, description = "Upload URL", body = ImageUploadResponse),
        (status = 422, description = "Not an image content type")
    )
)]
pub async fn create_image_upload(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ImageUploadRequest>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    payload.validate().into_result(&payload)?;

    let image_key = storage::image_key(user.id, &payload.filename);
    let upload_url = state
        .storage
        .presign_upload(&image_key, &payload.content_type)
        .await?;

    Ok(Json(ImageUploadResponse {
        upload_url,
        image_key,
    }))
}

// --- Admin Handlers ---

/// create_category
///
/// [Admin Route]
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    payload.validate().into_result(&payload)?;
    let category = state.repo.create_category(payload).await?;
    tracing::info!(slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Edits a category, including publishing or hiding it.
#[utoipa::path(
    put,
    path = "/admin/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    require_admin(&user)?;
    payload.validate().into_result(&payload)?;
    let category = state
        .repo
        .update_category(&slug, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

/// delete_category
///
/// [Admin Route] Removes a category. Its posts survive without a category.
#[utoipa::path(
    delete,
    path = "/admin/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    if state.repo.delete_category(&slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// create_location
///
/// [Admin Route]
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Created", body = Location),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    payload.validate().into_result(&payload)?;
    let location = state.repo.create_location(payload).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// update_location
///
/// [Admin Route]
#[utoipa::path(
    put,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    request_body = UpdateLocationRequest,
    responses(
        (status = 200, description = "Updated", body = Location),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Location>, ApiError> {
    require_admin(&user)?;
    payload.validate().into_result(&payload)?;
    let location = state
        .repo
        .update_location(id, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(location))
}

/// delete_location
///
/// [Admin Route] Removes a location. Its posts survive without a location.
#[utoipa::path(
    delete,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;
    if state.repo.delete_location(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
