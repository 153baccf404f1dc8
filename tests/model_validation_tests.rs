use blog_portal::models::{
    Comment, CreateCategoryRequest, CreatePostRequest, ImageUploadRequest, Post,
    UpdatePostRequest, User, UserProfile, is_valid_slug,
};
use chrono::Utc;
use uuid::Uuid;

// --- Payload Validation ---

#[test]
fn test_create_post_requires_title_text_and_category() {
    let errors = CreatePostRequest {
        pub_date: Utc::now(),
        ..Default::default()
    }
    .validate();

    assert!(errors.get("title").is_some());
    assert!(errors.get("text").is_some());
    assert!(errors.get("category_id").is_some());
    assert!(errors.get("location_id").is_none());
}

#[test]
fn test_title_length_limit() {
    let mut request = CreatePostRequest {
        title: "a".repeat(256),
        text: "Body".to_string(),
        pub_date: Utc::now(),
        category_id: Some(1),
        ..Default::default()
    };
    assert!(request.validate().is_empty());

    request.title.push('a');
    assert!(request.validate().get("title").is_some());
}

#[test]
fn test_partial_update_only_checks_present_fields() {
    assert!(UpdatePostRequest::default().validate().is_empty());

    let errors = UpdatePostRequest {
        title: Some(String::new()),
        ..Default::default()
    }
    .validate();
    assert!(errors.get("title").is_some());
}

#[test]
fn test_clear_flags_conflict_with_new_values() {
    let errors = UpdatePostRequest {
        image_key: Some("posts/x/y.png".to_string()),
        clear_image: true,
        ..Default::default()
    }
    .validate();
    assert!(errors.get("image_key").is_some());

    // Flags default to false when omitted from the JSON body.
    let request: UpdatePostRequest = serde_json::from_str(r#"{ "title": "New" }"#).unwrap();
    assert!(!request.clear_location && !request.clear_image);
    assert!(request.validate().is_empty());
}

#[test]
fn test_slug_charset() {
    assert!(is_valid_slug("travel"));
    assert!(is_valid_slug("road_trips-2024"));
    assert!(!is_valid_slug(""));
    assert!(!is_valid_slug("with space"));
    assert!(!is_valid_slug("путешествия"));

    let errors = CreateCategoryRequest {
        title: "Travel".to_string(),
        description: "Trips".to_string(),
        slug: "bad/slug".to_string(),
        is_published: None,
    }
    .validate();
    assert!(errors.get("slug").is_some());
}

#[test]
fn test_image_upload_must_be_an_image() {
    let ok = ImageUploadRequest {
        filename: "a.png".to_string(),
        content_type: "image/png".to_string(),
    };
    assert!(ok.validate().is_empty());

    let bad = ImageUploadRequest {
        filename: "a.pdf".to_string(),
        content_type: "application/pdf".to_string(),
    };
    assert!(bad.validate().get("content_type").is_some());
}

// --- Serialization ---

#[test]
fn test_public_profile_omits_role() {
    let user = User {
        id: Uuid::new_v4(),
        username: "gina".to_string(),
        role: "admin".to_string(),
    };

    let public = serde_json::to_value(UserProfile::public(&user)).unwrap();
    assert!(public.get("role").is_none());

    let own = serde_json::to_value(UserProfile::own(&user)).unwrap();
    assert_eq!(own["role"], "admin");
}

#[test]
fn test_post_serializes_joined_fields() {
    let post = Post {
        id: 7,
        title: "Hello".to_string(),
        author_username: "gina".to_string(),
        category_slug: Some("travel".to_string()),
        comment_count: 2,
        ..Default::default()
    };

    let json = serde_json::to_value(&post).unwrap();
    assert_eq!(json["author_username"], "gina");
    assert_eq!(json["category_slug"], "travel");
    assert_eq!(json["comment_count"], 2);
    assert!(json["location_id"].is_null());
}

#[test]
fn test_comment_author_username_is_optional_on_input() {
    let json = serde_json::json!({
        "id": 1,
        "text": "hi",
        "post_id": 3,
        "author_id": Uuid::new_v4(),
        "author_username": null,
        "created_at": Utc::now(),
    });
    let comment: Comment = serde_json::from_value(json).unwrap();
    assert_eq!(comment.post_id, 3);
    assert!(comment.author_username.is_none());
}
