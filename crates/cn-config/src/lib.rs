//! CribNosh Platform Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `CN_*` environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CN_API_HOST` | `server.host` |
//! | `CN_API_PORT` | `server.port` |
//! | `CN_LOG_LEVEL` | `logging.level` |
//! | `CN_LOG_JSON` | `logging.json` |
//! | `CN_BACKEND_URL` | `backend.url` |
//! | `CN_BACKEND_DEPLOY_KEY` | `backend.deploy_key` |
//! | `CN_BACKEND_MAX_ATTEMPTS` | `backend.max_attempts` |
//! | `CN_JWT_SECRET` | `auth.jwt_secret` |
//! | `CN_SESSION_COOKIE` | `auth.session_cookie` |
//! | `CN_WEBHOOK_TIMEOUT_SECS` | `webhooks.request_timeout_secs` |
//! | `CN_WEBHOOK_SIGNING_SECRET` | `webhooks.signing_secret` |
//! | `CN_AUDIT_SINK` | `audit.sink` |
//! | `CN_MONGO_URL` | `audit.mongo_url` |
//! | `CN_MONGO_DB` | `audit.mongo_db` |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub webhooks: WebhookConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Managed backend (Convex deployment) connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Deployment URL, e.g. `https://happy-otter-123.convex.cloud`
    pub url: String,
    /// Admin/deploy key sent as `Authorization: Convex <key>`
    pub deploy_key: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3210".to_string(),
            deploy_key: None,
            timeout_secs: 30,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for locally verified bearer JWTs. Without it every
    /// token is treated as a backend session token.
    pub jwt_secret: Option<String>,
    /// Cookie consulted when no `Authorization` header is present
    pub session_cookie: String,
    /// Role claim required by admin endpoints
    pub admin_role: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_cookie: "convex-auth-token".to_string(),
            admin_role: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// When set, deliveries carry an `X-Cribnosh-Signature` HMAC header
    pub signing_secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: "CribNosh-Webhooks/1.0".to_string(),
            signing_secret: None,
        }
    }
}

impl WebhookConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where admin audit records are appended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    /// `mutations/admin:insertAdminLog` on the managed backend
    #[default]
    Backend,
    /// `audit_logs` collection in MongoDB
    Mongo,
    /// Process-local store, lost on restart
    Memory,
}

impl FromStr for AuditSinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "audit.sink".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
    pub mongo_url: String,
    pub mongo_db: String,
    /// Records kept by the memory sink before the oldest are dropped
    pub memory_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::Backend,
            mongo_url: "mongodb://localhost:27017".to_string(),
            mongo_db: "cribnosh".to_string(),
            memory_capacity: 10_000,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing sections and fields take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read an optional TOML file, overlay the process environment and
    /// validate the result
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CN_*` variables obtained through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CN_API_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("CN_API_PORT") {
            self.server.port = parse_value("CN_API_PORT", &v)?;
        }
        if let Some(v) = lookup("CN_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("CN_LOG_JSON") {
            self.logging.json = parse_flag(&v);
        }
        if let Some(v) = lookup("CN_BACKEND_URL") {
            self.backend.url = v;
        }
        if let Some(v) = lookup("CN_BACKEND_DEPLOY_KEY") {
            self.backend.deploy_key = non_empty(v);
        }
        if let Some(v) = lookup("CN_BACKEND_MAX_ATTEMPTS") {
            self.backend.max_attempts = parse_value("CN_BACKEND_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("CN_JWT_SECRET") {
            self.auth.jwt_secret = non_empty(v);
        }
        if let Some(v) = lookup("CN_SESSION_COOKIE") {
            self.auth.session_cookie = v;
        }
        if let Some(v) = lookup("CN_WEBHOOK_TIMEOUT_SECS") {
            self.webhooks.request_timeout_secs = parse_value("CN_WEBHOOK_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CN_WEBHOOK_SIGNING_SECRET") {
            self.webhooks.signing_secret = non_empty(v);
        }
        if let Some(v) = lookup("CN_AUDIT_SINK") {
            self.audit.sink = v.parse()?;
        }
        if let Some(v) = lookup("CN_MONGO_URL") {
            self.audit.mongo_url = v;
        }
        if let Some(v) = lookup("CN_MONGO_DB") {
            self.audit.mongo_db = v;
        }
        if let Some(v) = lookup("CN_AUDIT_MEMORY_CAPACITY") {
            self.audit.memory_capacity = parse_value("CN_AUDIT_MEMORY_CAPACITY", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.url must not be empty".to_string()));
        }
        if self.backend.max_attempts == 0 {
            return Err(ConfigError::Invalid("backend.max_attempts must be at least 1".to_string()));
        }
        if self.webhooks.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("webhooks.request_timeout_secs must be positive".to_string()));
        }
        if self.auth.admin_role.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.admin_role must not be empty".to_string()));
        }
        if self.audit.sink == AuditSinkKind::Mongo && self.audit.mongo_url.trim().is_empty() {
            return Err(ConfigError::Invalid("audit.mongo_url is required for the mongo sink".to_string()));
        }
        if self.audit.memory_capacity == 0 {
            return Err(ConfigError::Invalid("audit.memory_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audit.sink, AuditSinkKind::Backend);
        assert_eq!(config.auth.session_cookie, "convex-auth-token");
        assert_eq!(config.backend.max_attempts, 3);
        assert!(config.webhooks.signing_secret.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [audit]
            sink = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.audit.sink, AuditSinkKind::Memory);
        assert_eq!(config.webhooks.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("[server\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("CN_API_PORT", "7001"),
                ("CN_LOG_JSON", "true"),
                ("CN_JWT_SECRET", "s3cret"),
                ("CN_AUDIT_SINK", "mongo"),
                ("CN_WEBHOOK_SIGNING_SECRET", ""),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 7001);
        assert!(config.logging.json);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.audit.sink, AuditSinkKind::Mongo);
        assert!(config.webhooks.signing_secret.is_none());
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("CN_API_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CN_API_PORT"));
    }

    #[test]
    fn test_unknown_audit_sink() {
        assert!("postgres".parse::<AuditSinkKind>().is_err());
        assert_eq!("MongoDB".parse::<AuditSinkKind>().unwrap(), AuditSinkKind::Mongo);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.backend.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_memory_sink_capacity() {
        let mut config = AppConfig::default();
        assert_eq!(config.audit.memory_capacity, 10_000);

        config
            .apply_env_overrides(env(&[("CN_AUDIT_SINK", "memory"), ("CN_AUDIT_MEMORY_CAPACITY", "250")]))
            .unwrap();
        assert_eq!(config.audit.memory_capacity, 250);

        config.audit.memory_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [backend]
            url = "https://example.convex.cloud"
            retry_backoff_ms = 50
            "#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.backend.url, "https://example.convex.cloud");
        assert_eq!(config.backend.retry_backoff(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/cribnosh.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
