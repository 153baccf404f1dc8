use blog_portal::storage::{ImageStorage, MockImageStorage, S3ImageStorage, image_key};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockImageStorage::new();
        let key = image_key(Uuid::new_v4(), "beach.jpg");
        let url = mock.presign_upload(&key, "image/jpeg").await.unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(&key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockImageStorage::new_failing();
        let result = mock.presign_upload("posts/x/y.png", "image/png").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_key_sanitization() {
        let author = Uuid::new_v4();
        let key = image_key(author, "../../etc/passwd");

        assert!(!key.contains(".."));
        assert!(key.starts_with(&format!("posts/{author}/")));
        // Two uploads of the same file never collide.
        assert_ne!(image_key(author, "a.png"), image_key(author, "a.png"));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    fn client() -> S3ImageStorage {
        S3ImageStorage::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
    }

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let key = image_key(Uuid::new_v4(), "sunset.png");
        let url = client().presign_upload(&key, "image/png").await.unwrap();

        // Signing is local; no request reaches the endpoint.
        assert!(url.starts_with("http://localhost:9000/testbucket/"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
