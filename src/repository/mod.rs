use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::RepoError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdateCategoryRequest, UpdateLocationRequest, UpdatePostRequest, User,
    },
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// PostQuery
///
/// Filter description for post listings. Every listing comes back newest first
/// (`pub_date` descending, then id descending) with author, location and
/// category joined and `comment_count` attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub author_id: Option<Uuid>,
    pub category_slug: Option<String>,
    /// Only posts scheduled at or before this instant.
    pub published_before: Option<DateTime<Utc>>,
    /// Only posts whose own flag and whose category's flag are set.
    pub published_only: bool,
}

impl PostQuery {
    /// The home feed: everything already public at `now`.
    pub fn feed(now: DateTime<Utc>) -> Self {
        Self {
            published_before: Some(now),
            published_only: true,
            ..Self::default()
        }
    }

    /// Public posts of one category at `now`.
    pub fn category(slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            category_slug: Some(slug.into()),
            ..Self::feed(now)
        }
    }

    /// Every post of one author, hidden ones included. The caller filters.
    pub fn by_author(author_id: Uuid) -> Self {
        Self {
            author_id: Some(author_id),
            ..Self::default()
        }
    }
}

/// Repository
///
/// The Entity Store contract. Ownership is not checked here: handlers run the
/// policy gate before calling any mutation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    // Conflict when the username is taken.
    async fn create_user(&self, user: User) -> Result<User, RepoError>;
    async fn update_username(&self, id: Uuid, username: &str) -> Result<User, RepoError>;

    // --- Categories ---
    async fn list_categories(&self, published_only: bool) -> Result<Vec<Category>, RepoError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError>;
    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError>;
    // Conflict when the slug is taken.
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError>;
    async fn update_category(
        &self,
        slug: &str,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError>;
    /// Posts in the category keep existing with their category cleared.
    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError>;

    // --- Locations ---
    async fn list_locations(&self, published_only: bool) -> Result<Vec<Location>, RepoError>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError>;
    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, RepoError>;
    async fn update_location(
        &self,
        id: i64,
        req: UpdateLocationRequest,
    ) -> Result<Option<Location>, RepoError>;
    /// Posts at the location keep existing with their location cleared.
    async fn delete_location(&self, id: i64) -> Result<bool, RepoError>;

    // --- Posts ---
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError>;
    async fn get_post(&self, id: i64) -> Result<Option<Post>, RepoError>;
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest)
    -> Result<Post, RepoError>;
    // Omitted fields keep their stored value; `clear_location`/`clear_image` null those columns.
    async fn update_post(&self, id: i64, req: UpdatePostRequest)
    -> Result<Option<Post>, RepoError>;
    /// Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> Result<bool, RepoError>;

    // --- Comments ---
    /// Oldest first.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError>;
    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, RepoError>;
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError>;
    // The creation timestamp never changes.
    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError>;
    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// Shared handle to the Entity Store held by `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
