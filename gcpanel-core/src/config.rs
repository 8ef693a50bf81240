use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
    pub oauth2: OAuth2Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Postgres user store. An empty URL selects the in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            connect_timeout_seconds: 10,
        }
    }
}

/// Redis state store. An empty URL selects the in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: "gcpanel:".to_string(),
        }
    }
}

/// Upper bound for `session.access_token_duration_hours` (one year)
pub const MAX_ACCESS_TOKEN_HOURS: u64 = 24 * 365;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HS256 signing secret, at least 32 bytes
    pub jwt_secret: String,
    pub access_token_duration_hours: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_duration_hours: 8,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_duration_hours", &self.access_token_duration_hours)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
    /// `service` field on the root span
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
            service_name: "gcpanel".to_string(),
        }
    }
}

/// `OAuth2` login flow settings
///
/// Client credentials are not part of this section; they come from
/// `{PROVIDER}_CLIENT_ID` / `{PROVIDER}_CLIENT_SECRET`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    /// Callback base, e.g. `https://panel.example.com/auth/callback`.
    /// `OAUTH_REDIRECT_URI` takes precedence when set.
    pub redirect_uri_base: String,
    pub state_ttl_seconds: u64,
    /// Applies to token exchange and userinfo requests
    pub http_timeout_seconds: u64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            redirect_uri_base: "http://localhost:8080/auth/callback".to_string(),
            state_ttl_seconds: 600,
            http_timeout_seconds: 10,
        }
    }
}

impl OAuth2Config {
    #[must_use]
    pub const fn state_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.state_ttl_seconds)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // GCPANEL_SERVER__HTTP_PORT, GCPANEL_OAUTH2__STATE_TTL_SECONDS, ...
        builder = builder.add_source(
            Environment::with_prefix("GCPANEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Collect every configuration problem instead of stopping at the first
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.session.jwt_secret.is_empty() {
            errors.push("session.jwt_secret must be set".to_string());
        } else if self.session.jwt_secret.len() < 32 {
            errors.push("session.jwt_secret must be at least 32 bytes".to_string());
        }
        if self.session.access_token_duration_hours == 0 {
            errors.push("session.access_token_duration_hours must be positive".to_string());
        } else if self.session.access_token_duration_hours > MAX_ACCESS_TOKEN_HOURS {
            errors.push(format!(
                "session.access_token_duration_hours must not exceed {MAX_ACCESS_TOKEN_HOURS}"
            ));
        }
        if self.oauth2.state_ttl_seconds == 0 {
            errors.push("oauth2.state_ttl_seconds must be positive".to_string());
        }
        if self.oauth2.http_timeout_seconds == 0 {
            errors.push("oauth2.http_timeout_seconds must be positive".to_string());
        }
        if url::Url::parse(&self.oauth2.redirect_uri_base).is_err() {
            errors.push(format!(
                "oauth2.redirect_uri_base is not a valid URL: {}",
                self.oauth2.redirect_uri_base
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}
