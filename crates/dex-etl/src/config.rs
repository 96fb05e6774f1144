//! Configuration management
//!
//! Every option has a default that keeps the pipeline runnable against the
//! public PokeAPI with no environment present.

use std::str::FromStr;
use std::time::Duration;

use dex_common::{DexError, Result};

use crate::models::IdRange;

// ============================================================================
// Upstream API Constants
// ============================================================================

/// Default PokeAPI base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://pokeapi.co/api/v2/";

/// Default number of retries after the first attempt.
pub const DEFAULT_API_RETRIES: u32 = 3;

/// Default backoff factor in seconds; the n-th retry waits `factor * 2^(n-1)`.
pub const DEFAULT_API_BACKOFF_FACTOR_SECS: f64 = 0.3;

/// Default delay after every successful request, in seconds.
pub const DEFAULT_REQUEST_DELAY_SECS: f64 = 0.1;

/// Default TCP connect timeout in seconds.
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: f64 = 3.05;

/// Default whole-request timeout in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: f64 = 10.0;

/// User agent sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = concat!("dex-etl/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Database Constants
// ============================================================================

/// Default database URL: a SQLite file in the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pokedex.db";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default pool acquire timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default connection max lifetime in seconds (30 minutes).
pub const DEFAULT_DATABASE_MAX_LIFETIME_SECS: u64 = 1800;

// ============================================================================
// Pipeline / Server Constants
// ============================================================================

pub const DEFAULT_START_ID: i64 = 1;
pub const DEFAULT_END_ID: i64 = 20;

/// Default number of pokemon fetched concurrently.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Most IDs a single `POST /trigger-etl` may request.
pub const MAX_TRIGGER_RANGE: usize = 1000;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Full application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

/// Upstream HTTP settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub retries: u32,
    pub backoff_factor: Duration,
    /// Applied after each successful request; zero disables it.
    pub request_delay: Duration,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

/// Store connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

/// Batch settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub range: IdRange,
    pub fetch_concurrency: usize,
}

/// Trigger API settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults, then validate it
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables without reading `.env`
    pub fn from_env() -> Result<Self> {
        let start: i64 = env_or("ETL_START_ID", DEFAULT_START_ID)?;
        let end: i64 = env_or("ETL_END_ID", DEFAULT_END_ID)?;

        Ok(Config {
            api: ApiConfig {
                base_url: env_or("POKEAPI_BASE_URL", DEFAULT_API_BASE_URL.to_string())?,
                retries: env_or("API_RETRIES", DEFAULT_API_RETRIES)?,
                backoff_factor: env_secs("API_BACKOFF_FACTOR", DEFAULT_API_BACKOFF_FACTOR_SECS)?,
                request_delay: env_secs("REQUEST_DELAY", DEFAULT_REQUEST_DELAY_SECS)?,
                connect_timeout: env_secs(
                    "API_CONNECT_TIMEOUT",
                    DEFAULT_API_CONNECT_TIMEOUT_SECS,
                )?,
                timeout: env_secs("API_TIMEOUT", DEFAULT_API_TIMEOUT_SECS)?,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL.to_string())?,
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                )?,
                connect_timeout: Duration::from_secs(env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?),
                idle_timeout: optional_secs(env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                )?),
                max_lifetime: optional_secs(env_or(
                    "DATABASE_MAX_LIFETIME",
                    DEFAULT_DATABASE_MAX_LIFETIME_SECS,
                )?),
            },
            pipeline: PipelineConfig {
                range: IdRange { start, end },
                fetch_concurrency: env_or("ETL_FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?,
            },
            server: ServerConfig {
                host: env_or("ETL_HOST", DEFAULT_SERVER_HOST.to_string())?,
                port: env_or("ETL_PORT", DEFAULT_SERVER_PORT)?,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(DexError::Config("POKEAPI_BASE_URL cannot be empty".to_string()));
        }

        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(DexError::Config(format!(
                "POKEAPI_BASE_URL is not an absolute URL: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout.is_zero() || self.api.connect_timeout.is_zero() {
            return Err(DexError::Config("API timeouts must be greater than 0".to_string()));
        }

        if self.database.url.is_empty() {
            return Err(DexError::Config("DATABASE_URL cannot be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(DexError::Config(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DexError::Config(format!(
                "DATABASE_MIN_CONNECTIONS ({}) cannot be greater than DATABASE_MAX_CONNECTIONS ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.pipeline.fetch_concurrency == 0 {
            return Err(DexError::Config(
                "ETL_FETCH_CONCURRENCY must be greater than 0".to_string(),
            ));
        }

        self.pipeline.range.validate()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout: Duration::from_secs(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout: optional_secs(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                max_lifetime: optional_secs(DEFAULT_DATABASE_MAX_LIFETIME_SECS),
            },
            pipeline: PipelineConfig {
                range: IdRange {
                    start: DEFAULT_START_ID,
                    end: DEFAULT_END_ID,
                },
                fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            },
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
            },
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            retries: DEFAULT_API_RETRIES,
            backoff_factor: Duration::from_secs_f64(DEFAULT_API_BACKOFF_FACTOR_SECS),
            request_delay: Duration::from_secs_f64(DEFAULT_REQUEST_DELAY_SECS),
            connect_timeout: Duration::from_secs_f64(DEFAULT_API_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs_f64(DEFAULT_API_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ApiConfig {
    /// Point the client at another base URL (used for mirrors and tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Disable the post-request delay and retry backoff
    pub fn without_delays(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self.backoff_factor = Duration::ZERO;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Read `name` from the environment, falling back to `default` when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DexError::invalid_env(name, &raw, e)),
        Err(_) => Ok(default),
    }
}

/// Read a non-negative number of (fractional) seconds
fn env_secs(name: &str, default: f64) -> Result<Duration> {
    let secs: f64 = env_or(name, default)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|e| DexError::invalid_env(name, &secs.to_string(), e))
}

/// Zero means "never"
fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
