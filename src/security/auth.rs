//! Bearer-token extractor for protected routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tracing::debug;

use super::jwt::{extract_bearer_token, Claims};
use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;

pub const UNAUTHENTICATED: &str = "Could not validate credentials";

fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
}

/// Caller identified by a valid access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn email(&self) -> &str {
        self.claims.email()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_from_headers(&parts.headers) else {
            return Err(ApiError::Unauthorized("Not authenticated".to_string()));
        };

        let claims = state.jwt_manager.validate_access_token(token).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            ApiError::Unauthorized(UNAUTHENTICATED.to_string())
        })?;

        Ok(AuthenticatedUser { claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_from_headers(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_from_headers(&headers), Some("tok"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_from_headers(&headers), None);
    }
}
