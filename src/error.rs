//! Error types shared by the store, storage and HTTP layers.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Entity Store errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("entity not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Object storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("presigning failed: {0}")]
    Presign(String),
}

/// FieldErrors
///
/// Field name to messages, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Turns a non-empty set of errors into `ApiError::Validation`, echoing `input`
    /// back so the client can re-present the form.
    pub fn into_result<T: Serialize>(self, input: &T) -> Result<(), ApiError> {
        if self.is_empty() {
            return Ok(());
        }
        Err(ApiError::Validation {
            errors: self,
            input: serde_json::to_value(input).unwrap_or(serde_json::Value::Null),
        })
    }
}

/// ApiError
///
/// Every failure a handler can surface. Hidden and missing resources share
/// `NotFound` so responses never reveal that a hidden entity exists.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("validation failed")]
    Validation {
        errors: FieldErrors,
        input: serde_json::Value,
    },

    #[error("authentication required")]
    Unauthorized,

    #[error("admin role required")]
    Forbidden,

    /// A failed ownership gate. Not an error page: the actor is sent to the
    /// entity's detail view with 303 See Other.
    #[error("redirect to {0}")]
    Redirect(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict(what) => ApiError::Conflict(what),
            RepoError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Resource not found" })),
            )
                .into_response(),
            ApiError::Validation { errors, input } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors, "input": input })),
            )
                .into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            ApiError::Redirect(location) => Redirect::to(&location).into_response(),
            ApiError::Conflict(what) => {
                (StatusCode::CONFLICT, Json(json!({ "error": what }))).into_response()
            }
            ApiError::Internal(detail) => {
                // Details stay in the logs.
                tracing::error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result(&json!({})).is_ok());
    }

    #[test]
    fn field_errors_echo_input() {
        let mut errors = FieldErrors::new();
        errors.add("title", "This field is required.");
        errors.add("title", "Second message.");

        match errors.into_result(&json!({ "title": "" })) {
            Err(ApiError::Validation { errors, input }) => {
                assert_eq!(errors.get("title").map(<[String]>::len), Some(2));
                assert_eq!(input["title"], "");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn repo_errors_map_to_api_errors() {
        assert!(matches!(ApiError::from(RepoError::NotFound), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(RepoError::Conflict("slug".into())),
            ApiError::Conflict(_)
        ));
    }

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let redirect = ApiError::Redirect("/posts/4".into()).into_response();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect.headers()["location"], "/posts/4");
    }
}
