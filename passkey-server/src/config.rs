//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Relying party identity lives in [`passkey_core::RelyingPartyConfig`].

use std::net::{Ipv4Addr, SocketAddr};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL connection string (in-memory credential store when unset)
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 5)
    pub database_max_connections: u32,
    /// Mark the session cookie `Secure` (default: false for tests, true when loaded from env)
    pub session_secure_cookie: bool,
    /// Session lifetime after the last request, in minutes (default: 120)
    pub session_inactivity_minutes: i64,
    /// Where the browser goes after a successful login (default: "/")
    pub redirect_to: String,
    /// Allow registering the first passkey without a session (default: false)
    pub bootstrap_registration: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 5,
            session_secure_cookie: false,
            session_inactivity_minutes: 120,
            redirect_to: "/".to_string(),
            bootstrap_registration: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .and_then(|h| h.trim().parse::<Ipv4Addr>().ok())
            .map(|ip| ip.octets())
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let redirect_to = std::env::var("PASSKEY_REDIRECT_TO")
            .ok()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(defaults.redirect_to);

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB").unwrap_or(defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
            rate_limit_enabled: env_flag("RATE_LIMIT_ENABLED").unwrap_or(true),
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            session_secure_cookie: env_flag("SESSION_SECURE_COOKIE").unwrap_or(true),
            session_inactivity_minutes: env_parse("SESSION_INACTIVITY_MINUTES")
                .unwrap_or(defaults.session_inactivity_minutes),
            redirect_to,
            bootstrap_registration: env_flag("PASSKEY_BOOTSTRAP_REGISTRATION").unwrap_or(false),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert!(!config.bootstrap_registration);
        assert!(!config.rate_limit_enabled);
        assert_eq!(config.redirect_to, "/");
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            host: [0, 0, 0, 0],
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }
}
