use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::FieldErrors, pagination::Page};

/// Upper bound for titles and names, matching the VARCHAR(256) columns.
pub const MAX_TITLE_CHARS: usize = 256;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The profile row mirrored from the external identity provider.
/// The `id` is the JWT subject; `username` addresses the public profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    // 'author' or 'admin'.
    pub role: String,
}

/// Category
///
/// An independently publishable grouping of posts, addressed by its unique slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A blog entry as returned by every post query: the `posts` row joined with its
/// author, location and category, plus the `comment_count` aggregated at query time.
///
/// The joined `category_is_published` flag is what the visibility policy reads;
/// it is `None` when the post has no category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    /// Scheduled publication time. A future value hides the post from the public.
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub author_username: String,
    pub location_id: Option<i64>,
    pub location_name: Option<String>,
    pub category_id: Option<i64>,
    pub category_slug: Option<String>,
    pub category_title: Option<String>,
    pub category_is_published: Option<bool>,
    // Object storage key of the attached image.
    pub image: Option<String>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

/// Comment
///
/// A comment row joined with its author's username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: Uuid,
    #[sqlx(default)]
    pub author_username: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Output Schemas ---

/// PostDetail
///
/// Detail view payload: the post and its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// UserProfile
///
/// Public view of a user. The role is only included for the user's own `/me` view.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserProfile {
    pub fn public(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: None,
        }
    }

    pub fn own(user: &User) -> Self {
        Self {
            role: Some(user.role.clone()),
            ..Self::public(user)
        }
    }
}

/// ProfilePage
///
/// Payload of `GET /profile/{username}`: the profile subject and one page of their posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfilePage {
    pub profile: UserProfile,
    pub posts: Page<Post>,
}

/// CategoryPage
///
/// Payload of `GET /category/{slug}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoryPage {
    pub category: Category,
    pub posts: Page<Post>,
}

/// ImageUploadResponse
///
/// A short-lived upload URL and the key to store in `CreatePostRequest::image_key`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ImageUploadResponse {
    pub upload_url: String,
    pub image_key: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// The password is forwarded to the identity provider and never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        if self.password.len() < 8 {
            errors.add("password", "Password must be at least 8 characters.");
        }
        check_username(&mut errors, &self.username);
        errors
    }
}

/// UpdateProfileRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub username: String,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_username(&mut errors, &self.username);
        errors
    }
}

/// CreatePostRequest
///
/// Input payload for `POST /posts`. The author is always the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub category_id: Option<i64>,
    pub location_id: Option<i64>,
    pub image_key: Option<String>,
    // Defaults to true when omitted.
    pub is_published: Option<bool>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, "title", &self.title);
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required.");
        }
        if self.category_id.is_none() {
            errors.add("category_id", "This field is required.");
        }
        errors
    }
}

/// UpdatePostRequest
///
/// Partial update payload for `PUT /posts/{id}`; omitted fields keep their value.
/// The category is required and can only be replaced; location and image can be
/// cleared with the `clear_*` flags.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,

    /// Detaches the post from its location.
    #[serde(default)]
    pub clear_location: bool,

    /// Removes the attached image.
    #[serde(default)]
    pub clear_image: bool,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.clear_location && self.location_id.is_some() {
            errors.add("location_id", "Either set a location or clear it, not both.");
        }
        if self.clear_image && self.image_key.is_some() {
            errors.add("image_key", "Either set an image or clear it, not both.");
        }
        if let Some(title) = &self.title {
            check_title(&mut errors, "title", title);
        }
        if let Some(text) = &self.text {
            if text.trim().is_empty() {
                errors.add("text", "This field may not be blank.");
            }
        }
        errors
    }
}

/// CommentRequest
///
/// Payload for both adding and editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentRequest {
    pub text: String,
}

impl CommentRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required.");
        }
        errors
    }
}

/// CreateCategoryRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: Option<bool>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, "title", &self.title);
        if self.description.trim().is_empty() {
            errors.add("description", "This field is required.");
        }
        if !is_valid_slug(&self.slug) {
            errors.add(
                "slug",
                "Use only latin letters, digits, hyphens and underscores.",
            );
        }
        errors
    }
}

/// UpdateCategoryRequest
///
/// The slug is the category's address and cannot be changed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            check_title(&mut errors, "title", title);
        }
        errors
    }
}

/// CreateLocationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateLocationRequest {
    pub name: String,
    pub is_published: Option<bool>,
}

impl CreateLocationRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_title(&mut errors, "name", &self.name);
        errors
    }
}

/// UpdateLocationRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateLocationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl UpdateLocationRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            check_title(&mut errors, "name", name);
        }
        errors
    }
}

/// ImageUploadRequest
///
/// Input payload for requesting a presigned post-image upload URL.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ImageUploadRequest {
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// Must be an `image/*` MIME type.
    #[schema(example = "image/jpeg")]
    pub content_type: String,
}

impl ImageUploadRequest {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if !self.content_type.starts_with("image/") {
            errors.add("content_type", "Only image uploads are accepted.");
        }
        errors
    }
}

// --- Field checks shared by the payload validators ---

fn check_title(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > MAX_TITLE_CHARS {
        errors.add(field, "Ensure this value has at most 256 characters.");
    }
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "@.+-_".contains(c);
    if username.is_empty() || username.len() > 150 || !username.chars().all(allowed) {
        errors.add(
            "username",
            "Enter a valid username of at most 150 letters, digits and @/./+/-/_ characters.",
        );
    }
}

/// Slugs may contain ASCII letters, digits, hyphens and underscores.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
