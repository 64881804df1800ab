//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use super::error::ApiError;
use super::server::AppState;
use crate::auth::{can, hash_token, Action, SESSION_COOKIE};
use crate::db::{SessionRepo, User};

/// Authenticated user resolved from the session cookie or a bearer token.
///
/// Rejects with 401 when no token is present, the session is unknown or
/// expired, or the user has been deactivated.
pub struct CurrentUser {
    pub user: User,
    /// Hash of the presented token, used to end this session on logout
    pub token_hash: String,
}

impl CurrentUser {
    /// Require a global (non-project) permission.
    pub fn require(&self, action: Action) -> Result<(), ApiError> {
        if can(self.user.role, action) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "role '{}' may not perform this action",
                self.user.role
            )))
        }
    }
}

/// `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or(ApiError::Unauthorized)?;

        let token_hash = hash_token(&token);
        let user = SessionRepo::new(&state.pool)
            .find_user(&token_hash, Utc::now())
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self { user, token_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn session_cookie_is_read() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; pms_session=tok"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("tok"));
    }
}
