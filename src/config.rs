use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// DuckDB database file. If not set, an in-memory database is used.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// IANA time zone used for day and month boundaries (default: UTC).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Dashboard origin for CORS restrictions on website routes.
    /// If not set, any origin is allowed.
    #[serde(default)]
    pub dashboard_origin: Option<String>,
    /// Deadline shared by all statistics queries of one request (default: 10).
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Whole-request timeout enforced by the router (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_query_timeout_secs() -> u64 {
    10
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: None,
            timezone: default_timezone(),
            dashboard_origin: None,
            query_timeout_secs: default_query_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `SITEPULSE_HOST` → host
    /// - `SITEPULSE_PORT` → port
    /// - `SITEPULSE_DATABASE` → database_path
    /// - `SITEPULSE_TIMEZONE` → timezone
    /// - `SITEPULSE_DASHBOARD_ORIGIN` → dashboard_origin
    /// - `SITEPULSE_QUERY_TIMEOUT` → query_timeout_secs
    /// - `SITEPULSE_REQUEST_TIMEOUT` → request_timeout_secs
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        if let Ok(host) = std::env::var("SITEPULSE_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("SITEPULSE_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(path) = std::env::var("SITEPULSE_DATABASE") {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Ok(tz) = std::env::var("SITEPULSE_TIMEZONE") {
            config.timezone = tz;
        }
        if let Ok(origin) = std::env::var("SITEPULSE_DASHBOARD_ORIGIN") {
            config.dashboard_origin = Some(origin);
        }
        if let Ok(val) = std::env::var("SITEPULSE_QUERY_TIMEOUT") {
            if let Ok(t) = val.parse() {
                config.query_timeout_secs = t;
            }
        }
        if let Ok(val) = std::env::var("SITEPULSE_REQUEST_TIMEOUT") {
            if let Ok(t) = val.parse() {
                config.request_timeout_secs = t;
            }
        }

        config
    }

    /// The configured time zone, or UTC if the name is not a known IANA zone.
    pub fn time_zone(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "Unknown time zone, using UTC");
            Tz::UTC
        })
    }

    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
