//! Authentication Service
//!
//! Resolves a bearer or cookie token to a [`Principal`]. Three-segment
//! tokens are HS256 JWTs verified locally when a secret is configured;
//! anything else is an opaque session token looked up in the backend.

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::backend::{functions, BackendClient};
use crate::domain::Principal;
use crate::error::{PlatformError, Result};

/// JWT claims accepted from admin clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
}

/// Backend user document, reduced to identity fields
#[derive(Debug, Deserialize)]
struct SessionUser {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: Option<String>,
    pub session_cookie: String,
    pub admin_role: String,
}

impl From<&cn_config::AuthConfig> for AuthSettings {
    fn from(config: &cn_config::AuthConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            session_cookie: config.session_cookie.clone(),
            admin_role: config.admin_role.clone(),
        }
    }
}

pub struct AuthService {
    backend: Arc<dyn BackendClient>,
    settings: AuthSettings,
    decoding_key: Option<DecodingKey>,
}

impl AuthService {
    pub fn new(backend: Arc<dyn BackendClient>, settings: AuthSettings) -> Self {
        let decoding_key = settings
            .jwt_secret
            .as_deref()
            .map(|secret| DecodingKey::from_secret(secret.as_bytes()));

        Self {
            backend,
            settings,
            decoding_key,
        }
    }

    pub fn session_cookie(&self) -> &str {
        &self.settings.session_cookie
    }

    pub fn admin_role(&self) -> &str {
        &self.settings.admin_role
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        match &self.decoding_key {
            Some(key) if looks_like_jwt(token) => self.verify_jwt(key, token),
            _ => self.resolve_session(token).await,
        }
    }

    /// Authenticate and require the admin role
    pub async fn authenticate_admin(&self, token: &str) -> Result<Principal> {
        let principal = self.authenticate(token).await?;
        if !principal.has_role(self.admin_role()) {
            return Err(PlatformError::forbidden("Admin access required"));
        }
        Ok(principal)
    }

    fn verify_jwt(&self, key: &DecodingKey, token: &str) -> Result<Principal> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(token, key, &validation).map_err(|e| {
            debug!(error = %e, "JWT rejected");
            PlatformError::unauthorized("Invalid or expired token")
        })?;

        let claims = data.claims;
        let user_id = claims
            .sub
            .or(claims.user_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlatformError::unauthorized("Token has no subject"))?;

        let mut principal = Principal::new(user_id).with_roles(claims.roles);
        principal.email = claims.email;
        Ok(principal)
    }

    async fn resolve_session(&self, token: &str) -> Result<Principal> {
        let value = self
            .backend
            .query(functions::GET_USER_BY_SESSION_TOKEN, json!({ "sessionToken": token }))
            .await?;

        if value.is_null() {
            return Err(PlatformError::unauthorized("Invalid or expired session"));
        }

        let user: SessionUser = serde_json::from_value(value)?;
        let mut principal = Principal::new(user.id).with_roles(user.roles);
        principal.email = user.email;
        Ok(principal)
    }
}

/// Strip the `Bearer ` scheme from an `Authorization` header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

fn looks_like_jwt(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, FunctionKind};
    use async_trait::async_trait;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::Value;

    const SECRET: &str = "test-secret";

    struct Sessions(Value);

    #[async_trait]
    impl BackendClient for Sessions {
        async fn call(&self, _kind: FunctionKind, _path: &str, args: Value) -> BackendResult<Value> {
            if args["sessionToken"] == "valid-session" {
                Ok(self.0.clone())
            } else {
                Ok(Value::Null)
            }
        }
    }

    fn service() -> AuthService {
        let backend = Arc::new(Sessions(json!({
            "_id": "user_9",
            "email": "chef@cribnosh.test",
            "roles": ["customer"]
        })));
        AuthService::new(
            backend,
            AuthSettings {
                jwt_secret: Some(SECRET.to_string()),
                session_cookie: "convex-auth-token".to_string(),
                admin_role: "admin".to_string(),
            },
        )
    }

    fn token(roles: &[&str], exp_offset: i64) -> String {
        let claims = AccessTokenClaims {
            sub: Some("admin_1".to_string()),
            user_id: None,
            email: Some("ops@cribnosh.test".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("bearer tok"), Some("tok"));
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn test_valid_jwt() {
        let principal = service().authenticate(&token(&["admin"], 3600)).await.unwrap();
        assert_eq!(principal.user_id, "admin_1");
        assert_eq!(principal.email.as_deref(), Some("ops@cribnosh.test"));
        assert!(principal.has_role("admin"));
    }

    #[tokio::test]
    async fn test_expired_jwt_is_unauthorized() {
        let err = service().authenticate(&token(&["admin"], -3600)).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let err = service().authenticate_admin(&token(&["customer"], 3600)).await.unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_session_token_lookup() {
        let svc = service();
        let principal = svc.authenticate("valid-session").await.unwrap();
        assert_eq!(principal.user_id, "user_9");
        assert!(!principal.has_role("admin"));

        let err = svc.authenticate("stale-session").await.unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
    }
}
