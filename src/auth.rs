use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` to act as an existing user without a token.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// JWT payload issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's UUID, matching `profiles.id`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// issue_token
///
/// Signs an HS256 token the way the identity provider does. Used by local
/// tooling and tests.
pub fn issue_token(
    user_id: Uuid,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// AuthUser Extractor
///
/// Resolution order:
/// 1. In `Env::Local`, an `x-user-id` header naming an existing profile.
/// 2. A `Bearer` token validated with the shared secret (expiry enforced).
/// 3. A profile lookup, so deleted users lose access even with a live token.
///
/// Rejects with 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let header_id = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());

            if let Some(user_id) = header_id {
                if let Ok(Some(user)) = repo.get_user(user_id).await {
                    return Ok(AuthUser {
                        id: user.id,
                        username: user.username,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            StatusCode::UNAUTHORIZED
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "profile lookup failed during auth");
                StatusCode::UNAUTHORIZED
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}

/// Viewer
///
/// The identity of whoever is browsing: a resolved user or the anonymous
/// sentinel. Never rejects; bad or missing credentials mean `Anonymous`.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    User(AuthUser),
}

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user.id),
        }
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let has_credentials = parts.headers.contains_key(header::AUTHORIZATION)
            || parts.headers.contains_key(DEV_USER_HEADER);
        if !has_credentials {
            return Ok(Viewer::Anonymous);
        }
        Ok(match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Viewer::User(user),
            Err(_) => Viewer::Anonymous,
        })
    }
}
