//! Authentication extractor and anti-forgery middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use cartsync_core::UserId;
use secrecy::ExposeSecret;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Extractor that requires a bearer token issued by `POST /auth/token`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireSession(user_id): RequireSession) -> String {
///     format!("Hello, {user_id}!")
/// }
/// ```
pub struct RequireSession(pub UserId);

impl RequireSession {
    /// Reject access to another user's cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` if `user_id` is not the session's user.
    pub fn require_user(&self, user_id: &UserId) -> Result<(), ApiError> {
        if &self.0 == user_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not your cart".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        state
            .user_for_token(token)
            .await
            .map(Self)
            .ok_or(ApiError::Unauthorized)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require the configured anti-forgery token on every non-GET request.
///
/// Does nothing when no token is configured.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` if the header is missing or wrong.
pub async fn require_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config().csrf_token
        && !matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS)
    {
        let provided = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.expose_secret()) {
            tracing::warn!(method = %request.method(), path = %request.uri().path(), "Rejected request without valid CSRF token");
            return Err(ApiError::Forbidden("Invalid CSRF token".to_string()));
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_require_user() {
        let session = RequireSession(UserId::new("alice"));
        assert!(session.require_user(&UserId::new("alice")).is_ok());
        assert!(matches!(
            session.require_user(&UserId::new("bob")),
            Err(ApiError::Forbidden(_))
        ));
    }
}
