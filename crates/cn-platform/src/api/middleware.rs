//! API Middleware
//!
//! Authentication extractor for admin routes. The [`AuthService`] is read
//! from request extensions, installed with `Extension(Arc<AuthService>)`.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::domain::Principal;
use crate::error::PlatformError;
use crate::service::{extract_bearer_token, AuthService};

/// Caller authenticated with the admin role.
///
/// Rejects with 401 when no valid token is presented and 403 when the
/// principal lacks the admin role. Place it before any body extractor so
/// unauthenticated requests are refused before their payload is examined.
pub struct AdminPrincipal(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
{
    type Rejection = PlatformError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| PlatformError::internal("AuthService extension not installed"))?;

        let token = request_token(parts, auth_service.session_cookie())
            .ok_or_else(|| PlatformError::unauthorized("Missing authentication token"))?;

        let principal = auth_service.authenticate_admin(&token).await?;
        Ok(AdminPrincipal(principal))
    }
}

/// Bearer header first, then the session cookie
fn request_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    if let Some(header) = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return extract_bearer_token(header).map(String::from);
    }

    CookieJar::from_headers(&parts.headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let p = parts(&[
            ("authorization", "Bearer header-token"),
            ("cookie", "convex-auth-token=cookie-token"),
        ]);
        assert_eq!(request_token(&p, "convex-auth-token").as_deref(), Some("header-token"));
    }

    #[test]
    fn test_cookie_fallback() {
        let p = parts(&[("cookie", "theme=dark; convex-auth-token=cookie-token")]);
        assert_eq!(request_token(&p, "convex-auth-token").as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_malformed_authorization_header_yields_nothing() {
        let p = parts(&[("authorization", "Token abc")]);
        assert_eq!(request_token(&p, "convex-auth-token"), None);
    }
}
