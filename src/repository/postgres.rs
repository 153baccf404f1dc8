use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostQuery, Repository};
use crate::{
    error::RepoError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, UpdateCategoryRequest, UpdateLocationRequest, UpdatePostRequest, User,
    },
};

/// Shared SELECT for every post query: joins the display data and counts
/// comments at query time.
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.author_id,
        u.username AS author_username,
        p.location_id, l.name AS location_name,
        p.category_id, c.slug AS category_slug, c.title AS category_title,
        c.is_published AS category_is_published,
        p.image, p.is_published, p.created_at,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN profiles u ON u.id = p.author_id
    LEFT JOIN locations l ON l.id = p.location_id
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE TRUE
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.text, c.post_id, c.author_id, u.username AS author_username, c.created_at
    FROM comments c
    JOIN profiles u ON u.id = c.author_id
"#;

/// PostgresRepository
///
/// The production Entity Store, backed by a sqlx connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique-key violations to `RepoError::Conflict` naming the clashing field.
fn conflict_on(field: &'static str) -> impl FnOnce(sqlx::Error) -> RepoError {
    move |err| match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(format!("{field} already taken"))
        }
        _ => RepoError::Database(err),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>("SELECT id, username, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, username, role FROM profiles WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO profiles (id, username, role) VALUES ($1, $2, $3) RETURNING id, username, role",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on("username"))
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "UPDATE profiles SET username = $2 WHERE id = $1 RETURNING id, username, role",
        )
        .bind(id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(conflict_on("username"))?
        .ok_or(RepoError::NotFound)
    }

    async fn list_categories(&self, published_only: bool) -> Result<Vec<Category>, RepoError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"SELECT id, title, description, slug, is_published, created_at
               FROM categories
               WHERE ($1 = FALSE OR is_published = TRUE)
               ORDER BY title"#,
        )
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, title, description, slug, is_published, created_at FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, RepoError> {
        sqlx::query_as::<_, Category>(
            r#"INSERT INTO categories (title, description, slug, is_published)
               VALUES ($1, $2, $3, $4)
               RETURNING id, title, description, slug, is_published, created_at"#,
        )
        .bind(req.title)
        .bind(req.description)
        .bind(req.slug)
        .bind(req.is_published.unwrap_or(true))
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on("slug"))
    }

    async fn update_category(
        &self,
        slug: &str,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>, RepoError> {
        let category = sqlx::query_as::<_, Category>(
            r#"UPDATE categories
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   is_published = COALESCE($4, is_published)
               WHERE slug = $1
               RETURNING id, title, description, slug, is_published, created_at"#,
        )
        .bind(slug)
        .bind(req.title)
        .bind(req.description)
        .bind(req.is_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<bool, RepoError> {
        // posts.category_id is ON DELETE SET NULL.
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_locations(&self, published_only: bool) -> Result<Vec<Location>, RepoError> {
        let locations = sqlx::query_as::<_, Location>(
            r#"SELECT id, name, is_published, created_at
               FROM locations
               WHERE ($1 = FALSE OR is_published = TRUE)
               ORDER BY name"#,
        )
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError> {
        let location = sqlx::query_as::<_, Location>(
            "SELECT id, name, is_published, created_at FROM locations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(location)
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, RepoError> {
        let location = sqlx::query_as::<_, Location>(
            r#"INSERT INTO locations (name, is_published) VALUES ($1, $2)
               RETURNING id, name, is_published, created_at"#,
        )
        .bind(req.name)
        .bind(req.is_published.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;
        Ok(location)
    }

    async fn update_location(
        &self,
        id: i64,
        req: UpdateLocationRequest,
    ) -> Result<Option<Location>, RepoError> {
        let location = sqlx::query_as::<_, Location>(
            r#"UPDATE locations
               SET name = COALESCE($2, name),
                   is_published = COALESCE($3, is_published)
               WHERE id = $1
               RETURNING id, name, is_published, created_at"#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.is_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(location)
    }

    async fn delete_location(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// list_posts
    ///
    /// Builds the WHERE clause from the `PostQuery` with bound parameters only.
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);

        if let Some(author_id) = query.author_id {
            builder.push(" AND p.author_id = ");
            builder.push_bind(author_id);
        }
        if let Some(slug) = &query.category_slug {
            builder.push(" AND c.slug = ");
            builder.push_bind(slug.clone());
        }
        if let Some(before) = query.published_before {
            builder.push(" AND p.pub_date <= ");
            builder.push_bind(before);
        }
        if query.published_only {
            builder.push(" AND p.is_published = TRUE AND (c.id IS NULL OR c.is_published = TRUE)");
        }

        builder.push(" ORDER BY p.pub_date DESC, p.id DESC");

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let sql = format!("{POST_SELECT} AND p.id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, RepoError> {
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO posts
                   (title, text, pub_date, author_id, location_id, category_id, image, is_published)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id"#,
        )
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(author_id)
        .bind(req.location_id)
        .bind(req.category_id)
        .bind(req.image_key)
        .bind(req.is_published.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;

        self.get_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, RepoError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"UPDATE posts
               SET title = COALESCE($2, title),
                   text = COALESCE($3, text),
                   pub_date = COALESCE($4, pub_date),
                   category_id = COALESCE($5, category_id),
                   location_id = CASE WHEN $9 THEN NULL ELSE COALESCE($6, location_id) END,
                   image = CASE WHEN $10 THEN NULL ELSE COALESCE($7, image) END,
                   is_published = COALESCE($8, is_published)
               WHERE id = $1
               RETURNING id"#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.category_id)
        .bind(req.location_id)
        .bind(req.image_key)
        .bind(req.is_published)
        .bind(req.clear_location)
        .bind(req.clear_image)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_post(id).await,
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        // comments.post_id is ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC");
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, RepoError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.id = $1");
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        // Insert and join the author in one round trip.
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (text, post_id, author_id) VALUES ($1, $2, $3)
                RETURNING id, text, post_id, author_id, created_at
            )
            SELECT i.id, i.text, i.post_id, i.author_id, u.username AS author_username, i.created_at
            FROM inserted i JOIN profiles u ON u.id = i.author_id
            "#,
        )
        .bind(text)
        .bind(post_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError> {
        let updated = sqlx::query("UPDATE comments SET text = $2 WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_comment(id).await
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
