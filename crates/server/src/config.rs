//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUEUEHUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `QUEUEHUB_BASE_URL` - Public URL of the server
//!
//! ## Optional
//! - `QUEUEHUB_HOST` - Bind address (default: 127.0.0.1)
//! - `QUEUEHUB_PORT` - Listen port (default: 3000)
//! - `QUEUEHUB_SESSION_HOURS` - Idle session lifetime (default: 168)
//! - `QUEUEHUB_SESSION_CLEANUP_SECS` - Expired session purge period (default: 3600)
//! - `QUEUEHUB_ROOM_CLEANUP_SECS` - Empty relay room purge period (default: 300)
//! - `QUEUEHUB_DASHBOARD_URL` - Where the dashboard app lives (default: the base URL)
//! - `QUEUEHUB_CORS_ORIGINS` - Comma separated dashboard origins
//! - `QUEUEHUB_LOG_JSON` - Emit JSON logs when set to `1` or `true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// URL of the dashboard single-page app
    pub dashboard_url: String,
    /// Sessions expire after this many hours without activity
    pub session_hours: i64,
    /// How often expired sessions are purged
    pub session_cleanup_interval: Duration,
    /// How often relay rooms without listeners are dropped
    pub room_cleanup_interval: Duration,
    /// Origins allowed to call the API from a browser
    pub cors_origins: Vec<String>,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("QUEUEHUB_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("QUEUEHUB_DATABASE_URL".to_string()))?;
        let base_url = lookup("QUEUEHUB_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("QUEUEHUB_BASE_URL".to_string()))?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("QUEUEHUB_BASE_URL".to_string(), e.to_string())
        })?;

        let session_hours: i64 = parse_or_default(&lookup, "QUEUEHUB_SESSION_HOURS", 168)?;
        if session_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "QUEUEHUB_SESSION_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let base_url = base_url.trim_end_matches('/').to_string();
        let dashboard_url = lookup("QUEUEHUB_DASHBOARD_URL")
            .map_or_else(|| base_url.clone(), |v| v.trim_end_matches('/').to_string());

        Ok(Self {
            database_url,
            host: parse_or_default(&lookup, "QUEUEHUB_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or_default(&lookup, "QUEUEHUB_PORT", 3000)?,
            base_url,
            dashboard_url,
            session_hours,
            session_cleanup_interval: Duration::from_secs(parse_or_default(
                &lookup,
                "QUEUEHUB_SESSION_CLEANUP_SECS",
                3600,
            )?),
            room_cleanup_interval: Duration::from_secs(parse_or_default(
                &lookup,
                "QUEUEHUB_ROOM_CLEANUP_SECS",
                300,
            )?),
            cors_origins: lookup("QUEUEHUB_CORS_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            log_json: lookup("QUEUEHUB_LOG_JSON").is_some_and(|v| is_truthy(&v)),
            sentry_dsn: lookup("SENTRY_DSN").filter(|v| !v.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT").filter(|v| !v.is_empty()),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Split a comma separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("QUEUEHUB_DATABASE_URL", "postgres://localhost/queuehub"),
        ("QUEUEHUB_BASE_URL", "http://localhost:3000/"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.session_hours, 168);
        assert_eq!(config.session_cleanup_interval, Duration::from_secs(3600));
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.dashboard_url, "http://localhost:3000");
        assert!(config.cors_origins.is_empty());
        assert!(!config.log_json);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_socket_addr() {
        let config = load(&REQUIRED).unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[("QUEUEHUB_BASE_URL", "http://localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "QUEUEHUB_DATABASE_URL"));
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[
            ("DATABASE_URL", "postgres://fallback/db"),
            ("QUEUEHUB_BASE_URL", "https://queuehub.app"),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/db");
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("QUEUEHUB_PORT", "eighty"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "QUEUEHUB_PORT"));
    }

    #[test]
    fn test_session_hours_must_be_positive() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("QUEUEHUB_SESSION_HOURS", "0"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_cors_origins_and_json_logs() {
        let mut vars = REQUIRED.to_vec();
        vars.push((
            "QUEUEHUB_CORS_ORIGINS",
            "https://app.queuehub.app, ,http://localhost:5173",
        ));
        vars.push(("QUEUEHUB_LOG_JSON", "true"));
        let config = load(&vars).unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://app.queuehub.app", "http://localhost:5173"]
        );
        assert!(config.log_json);
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = load(&[
            ("QUEUEHUB_DATABASE_URL", "postgres://user:hunter2@db/queuehub"),
            ("QUEUEHUB_BASE_URL", "http://localhost"),
        ])
        .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
