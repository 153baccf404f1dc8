//! Visibility and ownership rules.
//!
//! Everything here is a pure decision over already-fetched data. The current
//! time is always passed in so that callers (and tests) control the clock.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Category, Comment, Post},
};

/// Anything with an author that may edit or delete it.
pub trait Authored {
    fn author_id(&self) -> Uuid;
}

impl Authored for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// is_publicly_visible
///
/// A post is visible to everyone once it is published, its scheduled time has
/// passed, and its category (if any) is published too.
pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.pub_date <= now && post.category_is_published.unwrap_or(true)
}

/// is_visible_to
///
/// Authors always see their own posts; everyone else gets the public rule.
pub fn is_visible_to(post: &Post, viewer: Option<Uuid>, now: DateTime<Utc>) -> bool {
    viewer == Some(post.author_id) || is_publicly_visible(post, now)
}

/// filter_visible
///
/// Owner-aware filter for listings scoped to one author (the profile page):
/// the viewer's own posts pass unconditionally.
pub fn filter_visible(posts: Vec<Post>, viewer: Option<Uuid>, now: DateTime<Utc>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| is_visible_to(post, viewer, now))
        .collect()
}

/// filter_public
///
/// Strict filter for multi-author feeds. No author exception is granted.
pub fn filter_public(posts: Vec<Post>, now: DateTime<Utc>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|post| is_publicly_visible(post, now))
        .collect()
}

/// can_mutate
///
/// Only the author may edit or delete. Anonymous actors never can.
pub fn can_mutate<E: Authored>(entity: &E, actor: Option<Uuid>) -> bool {
    actor == Some(entity.author_id())
}

/// MutationDenied
///
/// Outcome of a failed ownership gate. Rendered as a redirect to the entity's
/// detail view rather than an error page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDenied {
    pub redirect_to: String,
}

impl From<MutationDenied> for ApiError {
    fn from(denied: MutationDenied) -> Self {
        ApiError::Redirect(denied.redirect_to)
    }
}

/// ensure_can_mutate
///
/// The ownership gate every mutation handler runs before touching the store.
pub fn ensure_can_mutate<E: Authored>(
    entity: &E,
    actor: Option<Uuid>,
    detail_url: impl Into<String>,
) -> Result<(), MutationDenied> {
    if can_mutate(entity, actor) {
        return Ok(());
    }
    Err(MutationDenied {
        redirect_to: detail_url.into(),
    })
}

/// require_published_category
///
/// Public browsing treats unpublished categories exactly like missing ones.
pub fn require_published_category(category: Option<Category>) -> Result<Category, ApiError> {
    category
        .filter(|category| category.is_published)
        .ok_or(ApiError::NotFound)
}

/// require_visible_post
///
/// Detail lookups fail with `NotFound` for posts the viewer may not see.
pub fn require_visible_post(
    post: Option<Post>,
    viewer: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Post, ApiError> {
    post.filter(|post| is_visible_to(post, viewer, now))
        .ok_or(ApiError::NotFound)
}

/// Canonical detail URL of a post; comment gates redirect here too.
pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{post_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn post(author: Uuid) -> Post {
        Post {
            id: 1,
            title: "Sunrise".into(),
            text: "Up early.".into(),
            pub_date: now() - Duration::days(1),
            author_id: author,
            author_username: "alice".into(),
            category_id: Some(1),
            category_slug: Some("travel".into()),
            category_title: Some("Travel".into()),
            category_is_published: Some(true),
            is_published: true,
            ..Post::default()
        }
    }

    #[test]
    fn published_past_post_in_published_category_is_visible() {
        assert!(is_publicly_visible(&post(Uuid::new_v4()), now()));
    }

    #[test]
    fn unpublished_post_is_hidden_whatever_else_holds() {
        let mut p = post(Uuid::new_v4());
        p.is_published = false;
        assert!(!is_publicly_visible(&p, now()));

        p.category_id = None;
        p.category_is_published = None;
        p.pub_date = now() - Duration::days(365);
        assert!(!is_publicly_visible(&p, now()));
    }

    #[test]
    fn future_post_is_hidden() {
        let mut p = post(Uuid::new_v4());
        p.pub_date = now() + Duration::seconds(1);
        assert!(!is_publicly_visible(&p, now()));
    }

    #[test]
    fn post_scheduled_exactly_now_is_visible() {
        let mut p = post(Uuid::new_v4());
        p.pub_date = now();
        assert!(is_publicly_visible(&p, now()));
    }

    #[test]
    fn unpublished_category_hides_post() {
        let mut p = post(Uuid::new_v4());
        p.category_is_published = Some(false);
        assert!(!is_publicly_visible(&p, now()));
    }

    #[test]
    fn post_without_category_only_needs_its_own_flags() {
        let mut p = post(Uuid::new_v4());
        p.category_id = None;
        p.category_is_published = None;
        assert!(is_publicly_visible(&p, now()));
    }

    #[test]
    fn author_always_sees_own_posts() {
        let author = Uuid::new_v4();
        let mut hidden = post(author);
        hidden.is_published = false;
        hidden.pub_date = now() + Duration::days(3);
        hidden.category_is_published = Some(false);

        let kept = filter_visible(vec![hidden.clone()], Some(author), now());
        assert_eq!(kept, vec![hidden.clone()]);

        assert!(filter_visible(vec![hidden.clone()], Some(Uuid::new_v4()), now()).is_empty());
        assert!(filter_visible(vec![hidden], None, now()).is_empty());
    }

    #[test]
    fn public_filter_grants_no_author_exception() {
        let author = Uuid::new_v4();
        let mut hidden = post(author);
        hidden.pub_date = now() + Duration::days(1);
        let visible = post(author);

        let kept = filter_public(vec![hidden, visible.clone()], now());
        assert_eq!(kept, vec![visible]);
    }

    #[test]
    fn filter_visible_is_idempotent_and_keeps_order() {
        let author = Uuid::new_v4();
        let mut posts = Vec::new();
        for id in 0..6 {
            let mut p = post(author);
            p.id = id;
            p.is_published = id % 2 == 0;
            posts.push(p);
        }
        let once = filter_visible(posts.clone(), None, now());
        let twice = filter_visible(once.clone(), None, now());
        assert_eq!(once, twice);
        assert_eq!(once, filter_visible(posts, None, now()));
        assert_eq!(once.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn only_the_author_can_mutate() {
        let author = Uuid::new_v4();
        let p = post(author);
        assert!(can_mutate(&p, Some(author)));
        assert!(!can_mutate(&p, Some(Uuid::new_v4())));
        assert!(!can_mutate(&p, None));

        let comment = Comment {
            id: 9,
            post_id: p.id,
            author_id: author,
            ..Comment::default()
        };
        assert!(can_mutate(&comment, Some(author)));
        assert!(!can_mutate(&comment, None));
    }

    #[test]
    fn denied_mutation_redirects_to_detail_view() {
        let p = post(Uuid::new_v4());
        let denied = ensure_can_mutate(&p, None, post_detail_url(p.id)).unwrap_err();
        assert_eq!(denied.redirect_to, "/posts/1");
        assert!(ensure_can_mutate(&p, Some(p.author_id), post_detail_url(p.id)).is_ok());
    }

    #[test]
    fn unpublished_category_is_not_found() {
        let hidden = Category {
            slug: "hidden".into(),
            is_published: false,
            ..Category::default()
        };
        assert!(matches!(
            require_published_category(Some(hidden)),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(require_published_category(None), Err(ApiError::NotFound)));

        let open = Category {
            slug: "open".into(),
            is_published: true,
            ..Category::default()
        };
        assert_eq!(require_published_category(Some(open)).unwrap().slug, "open");
    }

    #[test]
    fn hidden_post_detail_is_not_found_for_strangers() {
        let author = Uuid::new_v4();
        let mut p = post(author);
        p.pub_date = now() + Duration::days(1);

        assert!(matches!(
            require_visible_post(Some(p.clone()), None, now()),
            Err(ApiError::NotFound)
        ));
        assert!(require_visible_post(Some(p), Some(author), now()).is_ok());
        assert!(matches!(
            require_visible_post(None, Some(author), now()),
            Err(ApiError::NotFound)
        ));
    }
}
