use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PostQuery, Repository};
use crate::{
    error::RepoError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdateCategoryRequest, UpdateLocationRequest, UpdatePostRequest, User,
    },
};

/// A `posts` row before the display joins.
#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    author_id: Uuid,
    location_id: Option<i64>,
    category_id: Option<i64>,
    image: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    locations: Vec<Location>,
    posts: Vec<PostRow>,
    comments: Vec<Comment>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn username(&self, id: Uuid) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
    }

    fn join(&self, row: &PostRow) -> Post {
        let category = row
            .category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id));
        let location = row
            .location_id
            .and_then(|id| self.locations.iter().find(|l| l.id == id));

        Post {
            id: row.id,
            title: row.title.clone(),
            text: row.text.clone(),
            pub_date: row.pub_date,
            author_id: row.author_id,
            author_username: self.username(row.author_id).unwrap_or_default(),
            location_id: location.map(|l| l.id),
            location_name: location.map(|l| l.name.clone()),
            category_id: category.map(|c| c.id),
            category_slug: category.map(|c| c.slug.clone()),
            category_title: category.map(|c| c.title.clone()),
            category_is_published: category.map(|c| c.is_published),
            image: row.image.clone(),
            is_published: row.is_published,
            created_at: row.created_at,
            comment_count: self.comments.iter().filter(|c| c.post_id == row.id).count() as i64,
        }
    }

    fn with_author(&self, comment: &Comment) -> Comment {
        Comment {
            author_username: self.username(comment.author_id),
            ..comment.clone()
        }
    }

    fn matches(&self, post: &Post, query: &PostQuery) -> bool {
        if query.author_id.is_some_and(|id| id != post.author_id) {
            return false;
        }
        if let Some(slug) = &query.category_slug {
            if post.category_slug.as_deref() != Some(slug.as_str()) {
                return false;
            }
        }
        if query.published_before.is_some_and(|before| post.pub_date > before) {
            return false;
        }
        if query.published_only
            && !(post.is_published && post.category_is_published.unwrap_or(true))
        {
            return false;
        }
        true
    }
}

/// MemoryRepository
///
/// In-process Entity Store with the same semantics as `PostgresRepository`:
/// unique usernames and slugs, `SET NULL` on category/location deletion and
/// cascading comment deletion. Used by tests and demos that run without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict("username already taken".to_string()));
        }
        if tables.users.iter().any(|u| u.id == user.id) {
            return Err(RepoError::Conflict("id already taken".to_string()));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == username && u.id != id) {
            return Err(RepoError::Conflict("username already taken".to_string()));
        }
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        user.username = username.to_string();
        Ok(user.clone())
    }

    async fn list_categories(&self, published_only: bool) -> Result<Vec<Category>, RepoError> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .iter()
            .filter(|c| !published_only || c.is_published)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.slug == slug).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.categories.iter().any(|c| c.slug == req.slug) {
            return Err(RepoError::Conflict("slug already taken".to_string()));
        }
        let category = Category {
            id: tables.next_id(),
            title: req.title,
            description: req.description,
            slug: req.slug,
            is_published: req.is_published.unwrap_or(true),
            created_at: Utc::now(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        slug: &str,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(category) = tables.categories.iter_mut().find(|c| c.slug == slug) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            category.title = title;
        }
        if let Some(description) = req.description {
            category.description = description;
        }
        if let Some(is_published) = req.is_published {
            category.is_published = is_published;
        }
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.categories.iter().position(|c| c.slug == slug) else {
            return Ok(false);
        };
        let removed = tables.categories.remove(index);
        for post in tables.posts.iter_mut() {
            if post.category_id == Some(removed.id) {
                post.category_id = None;
            }
        }
        Ok(true)
    }

    async fn list_locations(&self, published_only: bool) -> Result<Vec<Location>, RepoError> {
        let tables = self.tables.read().await;
        let mut locations: Vec<Location> = tables
            .locations
            .iter()
            .filter(|l| !published_only || l.is_published)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.locations.iter().find(|l| l.id == id).cloned())
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, RepoError> {
        let mut tables = self.tables.write().await;
        let location = Location {
            id: tables.next_id(),
            name: req.name,
            is_published: req.is_published.unwrap_or(true),
            created_at: Utc::now(),
        };
        tables.locations.push(location.clone());
        Ok(location)
    }

    async fn update_location(
        &self,
        id: i64,
        req: UpdateLocationRequest,
    ) -> Result<Option<Location>, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(location) = tables.locations.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            location.name = name;
        }
        if let Some(is_published) = req.is_published {
            location.is_published = is_published;
        }
        Ok(Some(location.clone()))
    }

    async fn delete_location(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.locations.len();
        tables.locations.retain(|l| l.id != id);
        if tables.locations.len() == before {
            return Ok(false);
        }
        for post in tables.posts.iter_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(true)
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .map(|row| tables.join(row))
            .filter(|post| tables.matches(post, query))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|row| row.id == id)
            .map(|row| tables.join(row)))
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        let row = PostRow {
            id: tables.next_id(),
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            author_id,
            location_id: req.location_id,
            category_id: req.category_id,
            image: req.image_key,
            is_published: req.is_published.unwrap_or(true),
            created_at: Utc::now(),
        };
        let post = tables.join(&row);
        tables.posts.push(row);
        Ok(post)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.posts.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            row.title = title;
        }
        if let Some(text) = req.text {
            row.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            row.pub_date = pub_date;
        }
        if let Some(category_id) = req.category_id {
            row.category_id = Some(category_id);
        }
        if req.clear_location {
            row.location_id = None;
        } else if let Some(location_id) = req.location_id {
            row.location_id = Some(location_id);
        }
        if req.clear_image {
            row.image = None;
        } else if let Some(image) = req.image_key {
            row.image = Some(image);
        }
        if let Some(is_published) = req.is_published {
            row.is_published = is_published;
        }
        let row = row.clone();
        Ok(Some(tables.join(&row)))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.posts.len();
        tables.posts.retain(|row| row.id != id);
        if tables.posts.len() == before {
            return Ok(false);
        }
        tables.comments.retain(|c| c.post_id != id);
        Ok(true)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| tables.with_author(c))
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.with_author(c)))
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|row| row.id == post_id) {
            return Err(RepoError::NotFound);
        }
        let comment = Comment {
            id: tables.next_id(),
            text,
            post_id,
            author_id,
            author_username: None,
            created_at: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(tables.with_author(&comment))
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError> {
        let mut tables = self.tables.write().await;
        let Some(comment) = tables.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        comment.text = text;
        let comment = comment.clone();
        Ok(Some(tables.with_author(&comment)))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (MemoryRepository, User) {
        let repo = MemoryRepository::new();
        let user = repo
            .create_user(User {
                id: Uuid::new_v4(),
                username: "alice".into(),
                role: "author".into(),
            })
            .await
            .unwrap();
        (repo, user)
    }

    fn draft(title: &str, pub_date: DateTime<Utc>, category_id: Option<i64>) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            text: "Body".into(),
            pub_date,
            category_id,
            ..CreatePostRequest::default()
        }
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first_with_comment_counts() {
        let (repo, user) = seeded().await;
        let now = Utc::now();
        let older = repo
            .create_post(user.id, draft("older", now - Duration::days(2), None))
            .await
            .unwrap();
        let newer = repo
            .create_post(user.id, draft("newer", now - Duration::days(1), None))
            .await
            .unwrap();
        repo.add_comment(older.id, user.id, "first".into()).await.unwrap();
        repo.add_comment(older.id, user.id, "second".into()).await.unwrap();

        let posts = repo.list_posts(&PostQuery::by_author(user.id)).await.unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
        assert_eq!(posts[0].comment_count, 0);
        assert_eq!(posts[1].comment_count, 2);
        assert_eq!(posts[1].author_username, "alice");
    }

    #[tokio::test]
    async fn feed_query_applies_flags_and_schedule() {
        let (repo, user) = seeded().await;
        let now = Utc::now();
        let hidden = repo
            .create_category(CreateCategoryRequest {
                title: "Hidden".into(),
                description: "d".into(),
                slug: "hidden".into(),
                is_published: Some(false),
            })
            .await
            .unwrap();

        let visible = repo
            .create_post(user.id, draft("visible", now - Duration::hours(1), None))
            .await
            .unwrap();
        repo.create_post(user.id, draft("future", now + Duration::hours(1), None))
            .await
            .unwrap();
        repo.create_post(user.id, draft("in hidden", now - Duration::hours(1), Some(hidden.id)))
            .await
            .unwrap();

        let feed = repo.list_posts(&PostQuery::feed(now)).await.unwrap();
        assert_eq!(feed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![visible.id]);
    }

    #[tokio::test]
    async fn deleting_a_category_clears_the_reference() {
        let (repo, user) = seeded().await;
        let category = repo
            .create_category(CreateCategoryRequest {
                title: "Travel".into(),
                description: "d".into(),
                slug: "travel".into(),
                is_published: None,
            })
            .await
            .unwrap();
        let post = repo
            .create_post(user.id, draft("trip", Utc::now(), Some(category.id)))
            .await
            .unwrap();
        assert_eq!(post.category_slug.as_deref(), Some("travel"));

        assert!(repo.delete_category("travel").await.unwrap());
        let post = repo.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(post.category_id, None);
        assert_eq!(post.category_is_published, None);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades_to_comments() {
        let (repo, user) = seeded().await;
        let post = repo
            .create_post(user.id, draft("bye", Utc::now(), None))
            .await
            .unwrap();
        let comment = repo.add_comment(post.id, user.id, "hi".into()).await.unwrap();

        assert!(repo.delete_post(post.id).await.unwrap());
        assert!(repo.get_comment(comment.id).await.unwrap().is_none());
        assert!(!repo.delete_post(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn usernames_and_slugs_are_unique() {
        let (repo, _) = seeded().await;
        let clash = repo
            .create_user(User {
                id: Uuid::new_v4(),
                username: "alice".into(),
                role: "author".into(),
            })
            .await;
        assert!(matches!(clash, Err(RepoError::Conflict(_))));

        let category = CreateCategoryRequest {
            title: "T".into(),
            description: "d".into(),
            slug: "same".into(),
            is_published: None,
        };
        repo.create_category(category.clone()).await.unwrap();
        assert!(matches!(
            repo.create_category(category).await,
            Err(RepoError::Conflict(_))
        ));
    }
}
