//! Entity Store tests against a real Postgres.
//!
//! Ignored by default; run with `DATABASE_URL` set and `cargo test -- --ignored`.
//! Every test creates its own users, slugs and names so runs never collide.

use blog_portal::{
    models::{CreateCategoryRequest, CreateLocationRequest, CreatePostRequest, UpdatePostRequest, User},
    repository::{PostQuery, PostgresRepository, Repository},
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", &Uuid::new_v4().simple().to_string()[..12])
}

async fn create_test_user(repo: &PostgresRepository) -> User {
    repo.create_user(User {
        id: Uuid::new_v4(),
        username: unique("user"),
        role: "author".to_string(),
    })
    .await
    .expect("Failed to create test user")
}

async fn create_test_category(repo: &PostgresRepository, is_published: bool) -> i64 {
    repo.create_category(CreateCategoryRequest {
        title: "Test Category".to_string(),
        description: "Created by integration tests".to_string(),
        slug: unique("cat"),
        is_published: Some(is_published),
    })
    .await
    .expect("Failed to create test category")
    .id
}

fn post_request(title: &str, category_id: i64, offset: Duration) -> CreatePostRequest {
    CreatePostRequest {
        title: title.to_string(),
        text: "Integration body".to_string(),
        pub_date: Utc::now() + offset,
        category_id: Some(category_id),
        ..Default::default()
    }
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_usernames_are_unique() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&repo).await;

    let duplicate = repo
        .create_user(User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            role: "author".to_string(),
        })
        .await;
    assert!(matches!(duplicate, Err(blog_portal::error::RepoError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_post_joins_and_counts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let category_id = create_test_category(&repo, true).await;
    let location = repo
        .create_location(CreateLocationRequest {
            name: unique("place"),
            is_published: None,
        })
        .await
        .unwrap();

    let mut request = post_request("Joined", category_id, Duration::days(-1));
    request.location_id = Some(location.id);
    let post = repo.create_post(author.id, request).await.unwrap();

    assert_eq!(post.author_username, author.username);
    assert_eq!(post.category_id, Some(category_id));
    assert_eq!(post.category_is_published, Some(true));
    assert_eq!(post.location_name.as_deref(), Some(location.name.as_str()));
    assert_eq!(post.comment_count, 0);

    repo.add_comment(post.id, author.id, "one".to_string()).await.unwrap();
    repo.add_comment(post.id, author.id, "two".to_string()).await.unwrap();

    let reloaded = repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(reloaded.comment_count, 2);

    let comments = repo.list_comments(post.id).await.unwrap();
    let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two"]);
    assert_eq!(comments[0].author_username.as_deref(), Some(author.username.as_str()));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_feed_query_filters_hidden_posts() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let open = create_test_category(&repo, true).await;
    let hidden = create_test_category(&repo, false).await;

    let visible = repo
        .create_post(author.id, post_request("visible", open, Duration::days(-1)))
        .await
        .unwrap();
    let scheduled = repo
        .create_post(author.id, post_request("scheduled", open, Duration::days(1)))
        .await
        .unwrap();
    let in_hidden = repo
        .create_post(author.id, post_request("in hidden", hidden, Duration::days(-1)))
        .await
        .unwrap();
    let mut draft = post_request("draft", open, Duration::days(-1));
    draft.is_published = Some(false);
    let draft = repo.create_post(author.id, draft).await.unwrap();

    let feed = repo.list_posts(&PostQuery::feed(Utc::now())).await.unwrap();
    let ids: Vec<i64> = feed.iter().map(|p| p.id).collect();
    assert!(ids.contains(&visible.id));
    assert!(!ids.contains(&scheduled.id));
    assert!(!ids.contains(&in_hidden.id));
    assert!(!ids.contains(&draft.id));

    // The author query returns everything, newest first.
    let own = repo.list_posts(&PostQuery::by_author(author.id)).await.unwrap();
    assert_eq!(own.len(), 4);
    assert_eq!(own[0].id, scheduled.id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_keeps_omitted_fields() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let category_id = create_test_category(&repo, true).await;
    let post = repo
        .create_post(author.id, post_request("Before", category_id, Duration::hours(-1)))
        .await
        .unwrap();

    let updated = repo
        .update_post(
            post.id,
            UpdatePostRequest {
                title: Some("After".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "After");
    assert_eq!(updated.text, post.text);
    assert_eq!(updated.category_id, Some(category_id));
    assert!(repo.update_post(i64::MAX, UpdatePostRequest::default()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_deletes_cascade_and_clear_references() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let category_id = create_test_category(&repo, true).await;
    let slug = repo.get_category(category_id).await.unwrap().unwrap().slug;

    let post = repo
        .create_post(author.id, post_request("Orphan", category_id, Duration::hours(-1)))
        .await
        .unwrap();
    let comment = repo
        .add_comment(post.id, author.id, "bye".to_string())
        .await
        .unwrap();

    assert!(repo.delete_category(&slug).await.unwrap());
    let orphan = repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(orphan.category_id, None);
    assert_eq!(orphan.category_is_published, None);

    assert!(repo.delete_post(post.id).await.unwrap());
    assert!(repo.get_comment(comment.id).await.unwrap().is_none());
    assert!(!repo.delete_post(post.id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_can_clear_location_and_image() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let author = create_test_user(&repo).await;
    let category_id = create_test_category(&repo, true).await;
    let location = repo
        .create_location(CreateLocationRequest {
            name: unique("place"),
            is_published: None,
        })
        .await
        .unwrap();

    let mut request = post_request("Placed", category_id, Duration::hours(-1));
    request.location_id = Some(location.id);
    request.image_key = Some(format!("posts/{}/placed.png", author.id));
    let post = repo.create_post(author.id, request).await.unwrap();

    let cleared = repo
        .update_post(
            post.id,
            UpdatePostRequest {
                clear_location: true,
                clear_image: true,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cleared.location_id, None);
    assert_eq!(cleared.image, None);
    assert_eq!(cleared.title, "Placed");
}
