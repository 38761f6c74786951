//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `ROLE_CACHE_TTL_SECS` - How long a resolved role is trusted (default: 3600)
//! - `CATALOG_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `AUTH_RATE_LIMIT_BURST` - Auth attempts allowed at once per IP (default: 5)
//! - `AUTH_RATE_LIMIT_REPLENISH_SECS` - Seconds to earn one more attempt (default: 6)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)
//! - `LOG_FORMAT` - `text` or `json` (default: text)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Default lifetime of a role cache entry.
pub const DEFAULT_ROLE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default lifetime of cached catalog reads.
pub const DEFAULT_CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Role cache and catalog cache lifetimes
    pub cache: CacheConfig,
    /// Limits on `/auth` requests
    pub auth_rate_limit: RateLimitConfig,
    /// Sentry error tracking settings
    pub sentry: SentryConfig,
    /// Log line format
    pub log_format: LogFormat,
}

/// How log lines are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One flattened JSON object per event, for log shippers.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a resolved role is trusted before the admin table is asked again.
    pub role_ttl: Duration,
    /// How long catalog reads are served from memory.
    pub catalog_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            role_ttl: DEFAULT_ROLE_CACHE_TTL,
            catalog_ttl: DEFAULT_CATALOG_CACHE_TTL,
        }
    }
}

/// Per-IP request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Seconds until one more request is allowed.
    pub replenish_secs: u64,
    /// Requests allowed back to back.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            replenish_secs: 6,
            burst: 5,
        }
    }
}

/// Sentry settings. Sentry is disabled when `dsn` is `None`.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// Sentry DSN for error tracking
    pub dsn: Option<String>,
    /// Environment tag (e.g. production, staging)
    pub environment: Option<String>,
    /// Error event sample rate
    pub sample_rate: f32,
    /// Performance trace sample rate
    pub traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        let cache = CacheConfig::from_env()?;
        let auth_rate_limit = RateLimitConfig::from_env()?;
        let sentry = SentryConfig::from_env()?;
        let log_format = parse_env_or_default("LOG_FORMAT", "text")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cache,
            auth_rate_limit,
            sentry,
            log_format,
        })
    }

    /// Configuration for local development and tests.
    ///
    /// Binds to localhost on an unprivileged port; nothing here is secret.
    #[must_use]
    pub fn local(database_url: &str) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            cache: CacheConfig::default(),
            auth_rate_limit: RateLimitConfig::default(),
            sentry: SentryConfig::default(),
            log_format: LogFormat::Text,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let role_ttl = parse_env_or_default::<u64>("ROLE_CACHE_TTL_SECS", "3600")?;
        let catalog_ttl = parse_env_or_default::<u64>("CATALOG_CACHE_TTL_SECS", "300")?;

        if role_ttl == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ROLE_CACHE_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            role_ttl: Duration::from_secs(role_ttl),
            catalog_ttl: Duration::from_secs(catalog_ttl),
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let limits = Self {
            replenish_secs: parse_env_or_default("AUTH_RATE_LIMIT_REPLENISH_SECS", "6")?,
            burst: parse_env_or_default("AUTH_RATE_LIMIT_BURST", "5")?,
        };
        if limits.replenish_secs == 0 || limits.burst == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AUTH_RATE_LIMIT_*".to_string(),
                "limits must be greater than zero".to_string(),
            ));
        }
        Ok(limits)
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
