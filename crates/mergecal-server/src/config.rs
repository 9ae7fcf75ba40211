//! Server configuration.
//!
//! All settings come from the environment:
//!
//! - `ICS_SOURCES` (required) - JSON array of `{"url", "label"}` objects
//! - `DEFAULT_LOOKBACK_DAYS` (default 7) - window start when the request
//!   omits `timeMin`
//! - `DEFAULT_LOOKAHEAD_DAYS` (default 30) - window end when the request
//!   omits `timeMax`
//! - `MERGECAL_BIND` (default `0.0.0.0:8008`) - listen address

use std::net::SocketAddr;

use thiserror::Error;

use mergecal_core::Source;

/// Variable holding the JSON source list.
pub const SOURCES_VAR: &str = "ICS_SOURCES";
/// Variable overriding the default lookback window, in days.
pub const LOOKBACK_VAR: &str = "DEFAULT_LOOKBACK_DAYS";
/// Variable overriding the default lookahead window, in days.
pub const LOOKAHEAD_VAR: &str = "DEFAULT_LOOKAHEAD_DAYS";
/// Variable overriding the listen address.
pub const BIND_VAR: &str = "MERGECAL_BIND";

const DEFAULT_LOOKBACK_DAYS: i64 = 7;
const DEFAULT_LOOKAHEAD_DAYS: i64 = 30;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid {var}: {reason}")]
    Invalid {
        /// The offending variable.
        var: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Configured feed sources, in merge-priority order.
    pub sources: Vec<Source>,

    /// Days before now covered when the request omits `timeMin`.
    pub lookback_days: i64,

    /// Days after now covered when the request omits `timeMax`.
    pub lookahead_days: i64,
}

impl ServerConfig {
    /// Loads the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `ICS_SOURCES` is missing or
    /// malformed, or when a numeric override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_sources =
            std::env::var(SOURCES_VAR).map_err(|_| ConfigError::Missing(SOURCES_VAR))?;
        let sources: Vec<Source> =
            serde_json::from_str(&raw_sources).map_err(|e| ConfigError::Invalid {
                var: SOURCES_VAR,
                reason: e.to_string(),
            })?;
        if sources.is_empty() {
            return Err(ConfigError::Invalid {
                var: SOURCES_VAR,
                reason: "source list is empty".to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse_var(BIND_VAR)?.unwrap_or_else(default_bind_addr),
            sources,
            lookback_days: parse_var(LOOKBACK_VAR)?.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            lookahead_days: parse_var(LOOKAHEAD_VAR)?.unwrap_or(DEFAULT_LOOKAHEAD_DAYS),
        })
    }

    /// Creates a configuration with the given sources and defaults for
    /// everything else.
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sources,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }

    /// Builder: set the listen address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Builder: set the default lookback, in days.
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    /// Builder: set the default lookahead, in days.
    pub fn with_lookahead_days(mut self, days: i64) -> Self {
        self.lookahead_days = days;
        self
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8008))
}

/// Parses an optional environment variable, mapping parse failures to
/// [`ConfigError::Invalid`].
fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
