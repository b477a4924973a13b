//! Configuration module for the CourseMaker backend.
//!
//! Settings come from `COURSEMAKER_*` environment variables, after `.env` is loaded. Unset variables
//! fall back to defaults; set but malformed ones are reported instead of silently replaced.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_DB_PATH: &str = "./data/coursemaker.sqlite";
const DEFAULT_INDEX_PATH: &str = "./data/index";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// A configuration variable that is set but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}={:?}: {}", self.variable, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication. Authentication is off when unset.
    pub api_psk: Option<String>,
    pub db_path: PathBuf,
    pub index_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Default tracing filter; `RUST_LOG` overrides it
    pub log_level: String,
    /// Largest page size honoured by the paginated course listing
    pub max_page_size: u32,
}

impl Config {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let max_page_size: u32 = parse_var(
            "COURSEMAKER_MAX_PAGE_SIZE",
            lookup("COURSEMAKER_MAX_PAGE_SIZE"),
            DEFAULT_MAX_PAGE_SIZE,
        )?;
        if max_page_size == 0 {
            return Err(ConfigError {
                variable: "COURSEMAKER_MAX_PAGE_SIZE",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_psk: lookup("COURSEMAKER_API_PSK").filter(|key| !key.is_empty()),
            db_path: text("COURSEMAKER_DB_PATH", DEFAULT_DB_PATH).into(),
            index_path: text("COURSEMAKER_INDEX_PATH", DEFAULT_INDEX_PATH).into(),
            bind_addr: parse_var(
                "COURSEMAKER_BIND_ADDR",
                lookup("COURSEMAKER_BIND_ADDR"),
                default_bind_addr(),
            )?,
            log_level: text("COURSEMAKER_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            max_page_size,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn parse_var<T>(variable: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError {
                variable,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
