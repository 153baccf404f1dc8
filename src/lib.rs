use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod policy;
pub mod repository;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockImageStorage, S3ImageStorage, StorageState};

/// Correlation header generated for every request and echoed in the response.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_posts, handlers::category_posts, handlers::post_detail,
        handlers::profile, handlers::list_categories, handlers::list_locations,
        handlers::register_user, handlers::get_me, handlers::update_me,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::add_comment, handlers::update_comment, handlers::delete_comment,
        handlers::create_image_upload, handlers::create_category, handlers::update_category,
        handlers::delete_category, handlers::create_location, handlers::update_location,
        handlers::delete_location
    ),
    components(
        schemas(
            models::Post, models::Comment, models::Category, models::Location,
            models::PostDetail, models::UserProfile, models::ProfilePage, models::CategoryPage,
            models::CreatePostRequest, models::UpdatePostRequest, models::CommentRequest,
            models::CreateCategoryRequest, models::UpdateCategoryRequest,
            models::CreateLocationRequest, models::UpdateLocationRequest,
            models::RegisterUserRequest, models::UpdateProfileRequest,
            models::ImageUploadRequest, models::ImageUploadResponse,
        )
    ),
    tags(
        (name = "blog", description = "Blog with scheduled publication")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Built once in `main` and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Entity Store (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Object storage for post images.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects with 401 before the handler runs when `AuthUser` cannot be resolved.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the public, authenticated and admin routers, then wraps them in the
/// request-id, tracing and CORS layers shared by every endpoint.
pub fn create_router(state: AppState) -> Router {
    with_observability(api_routes(state)).layer(cors_layer())
}

/// The application routes. Only the authenticated router passes through
/// `auth_middleware`; admin handlers resolve `AuthUser` themselves.
fn api_routes(state: AppState) -> Router {
    let authenticated = authenticated::authenticated_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated)
        .nest("/admin", admin::admin_routes())
        .with_state(state)
}

/// Browsers must be able to read `Location` to follow an ownership redirect
/// and `x-request-id` to report failures.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([header::LOCATION, REQUEST_ID_HEADER])
}

fn with_observability(router: Router) -> Router {
    let on_response = DefaultOnResponse::new()
        .level(Level::INFO)
        .latency_unit(tower_http::LatencyUnit::Millis);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(request_span)
                    .on_response(on_response),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER)),
    )
}

/// request_span
///
/// One `http_request` span per request, tagged with the id set by
/// `SetRequestIdLayer` so every log line of a request can be correlated.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let req_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        req_id = %req_id,
    )
}
