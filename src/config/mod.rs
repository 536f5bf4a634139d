//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden with
//! `EMGURUS_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub review: ReviewConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the browser client)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/emgurus.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// Session and identity-provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret the identity provider signs assertions with.
    /// Sign-in is disabled when unset.
    #[serde(default)]
    pub provider_secret: Option<String>,
    /// Session lifetime in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Maximum age of an identity assertion in seconds
    #[serde(default = "default_assertion_max_age_secs")]
    pub assertion_max_age_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider_secret: None,
            session_ttl_hours: default_session_ttl_hours(),
            assertion_max_age_secs: default_assertion_max_age_secs(),
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24 * 7
}

fn default_assertion_max_age_secs() -> i64 {
    300
}

/// Notification dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Bounded queue size; notifications beyond it are dropped and logged
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Site name used in subjects and signatures
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// SMTP relay; notifications are only logged when absent
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            site_name: default_site_name(),
            smtp: None,
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_site_name() -> String {
    "EMGurus".to_string()
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_site_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Review queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Page size when a query gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Upper bound for any requested limit
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    /// Maximum reviewer note length in characters
    #[serde(default = "default_max_note_len")]
    pub max_note_len: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_note_len: default_max_note_len(),
        }
    }
}

fn default_limit() -> i64 {
    20
}

fn default_max_limit() -> i64 {
    100
}

fn default_max_note_len() -> usize {
    2000
}

impl ReviewConfig {
    /// Resolve a requested limit against the configured bounds
    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file, then apply `EMGURUS_*` overrides
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("EMGURUS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("EMGURUS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(origin) = std::env::var("EMGURUS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Ok(driver) = std::env::var("EMGURUS_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("EMGURUS_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("EMGURUS_AUTH_PROVIDER_SECRET") {
            self.auth.provider_secret = Some(secret);
        }
        if let Ok(ttl) = std::env::var("EMGURUS_AUTH_SESSION_TTL_HOURS") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                self.auth.session_ttl_hours = ttl;
            }
        }

        if let Ok(capacity) = std::env::var("EMGURUS_NOTIFICATION_QUEUE_CAPACITY") {
            if let Ok(capacity) = capacity.parse::<usize>() {
                self.notification.queue_capacity = capacity;
            }
        }
        if let Some(smtp) = self.notification.smtp.as_mut() {
            if let Ok(host) = std::env::var("EMGURUS_SMTP_HOST") {
                smtp.host = host;
            }
            if let Ok(password) = std::env::var("EMGURUS_SMTP_PASSWORD") {
                smtp.password = password;
            }
        }
    }
}

fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
