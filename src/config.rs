//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub client: ClientConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Front-end client application
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Origin allowed by CORS (e.g., "http://localhost:5500")
    pub origin: String,
    /// Absolute URL the browser lands on after a successful sign-in
    pub login_redirect: String,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens (32+ bytes)
    pub jwt_secret: String,
    /// Emails promoted to the admin role at start-up
    #[serde(default)]
    pub admin_emails: Vec<String>,
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback registered with the provider
    pub redirect_uri: String,
    #[serde(default = "default_google_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub userinfo_url: String,
}

pub fn default_google_authorize_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

pub fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

pub fn default_google_userinfo_url() -> String {
    "https://openidconnect.googleapis.com/v1/userinfo".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> String {
        format!("inmo={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (INMO__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.environment", "development")?
            .set_default("database.path", "data/inmo.db")?
            .set_default("client.origin", "http://localhost:5500")?
            .set_default("client.login_redirect", "http://localhost:5500/index.html")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("INMO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_emails")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Session cookies carry `Secure` only in production.
    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.environment == Environment::Production
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_JWT_SECRET_BYTES: usize = 32;

        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_BYTES
            )));
        }

        if self.auth.google.client_id.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "auth.google.client_id must not be empty".to_string(),
            ));
        }

        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "pretty" | "json") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        for (key, value) in [
            ("client.login_redirect", &self.client.login_redirect),
            ("auth.google.redirect_uri", &self.auth.google.redirect_uri),
            ("auth.google.authorize_url", &self.auth.google.authorize_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} must be an absolute URL: {e}"))
            })?;
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                environment = ?self.server.environment,
                "Using insecure session cookies outside production"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                environment: Environment::Development,
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/inmo-test.db"),
            },
            client: ClientConfig {
                origin: "http://localhost:5500".to_string(),
                login_redirect: "http://localhost:5500/index.html".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "x".repeat(32),
                admin_emails: Vec::new(),
                google: GoogleOAuthConfig {
                    client_id: "google-client-id".to_string(),
                    client_secret: "google-client-secret".to_string(),
                    redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
                    authorize_url: default_google_authorize_url(),
                    token_url: default_google_token_url(),
                    userinfo_url: default_google_userinfo_url(),
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_development_config() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.should_use_secure_cookies());
    }

    #[test]
    fn logging_section_drives_subscriber_setup() {
        let mut config = valid_config();
        config.logging.level = "debug".to_string();
        config.logging.format = "JSON".to_string();

        assert!(config.logging.is_json());
        assert_eq!(config.logging.default_filter(), "inmo=debug,tower_http=debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            config.validate(),
            Err(crate::error::AppError::Config(_))
        ));
    }

    #[test]
    fn production_enables_secure_cookies() {
        let mut config = valid_config();
        config.server.environment = Environment::Production;
        assert!(config.should_use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_jwt_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.jwt_secret")
        ));
    }

    #[test]
    fn validate_rejects_relative_login_redirect() {
        let mut config = valid_config();
        config.client.login_redirect = "/index.html".to_string();

        let error = config
            .validate()
            .expect_err("relative redirect must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("client.login_redirect")
        ));
    }

    #[test]
    fn validate_rejects_empty_client_id() {
        let mut config = valid_config();
        config.auth.google.client_id = "  ".to_string();

        assert!(config.validate().is_err());
    }
}
