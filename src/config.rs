use std::env;
use std::time::Duration;

use crate::{ConsoleError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8086";
pub const DEFAULT_INDEX: &str = "essem";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Idle time after the last keystroke before a metric search is sent.
pub const DEFAULT_SEARCH_IDLE_MILLIS: u64 = 400;

/// Connection settings for the console client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub base_url: String,
    pub index: String,
    pub timeout: Duration,
    pub search_idle: Duration,
    /// Display timezone applied when a query doesn't name one.
    pub default_tz: Option<String>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            index: DEFAULT_INDEX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search_idle: Duration::from_millis(DEFAULT_SEARCH_IDLE_MILLIS),
            default_tz: None,
        }
    }
}

impl ConsoleSettings {
    /// Reads `MGRAPH_URL`, `MGRAPH_INDEX`, `MGRAPH_TIMEOUT_SECS`,
    /// `MGRAPH_SEARCH_IDLE_MS` and `MGRAPH_TZ`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("MGRAPH_URL").unwrap_or(defaults.base_url);
        let index = lookup("MGRAPH_INDEX").unwrap_or(defaults.index);

        let timeout = match lookup("MGRAPH_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("MGRAPH_TIMEOUT_SECS", &raw)?),
            None => defaults.timeout,
        };
        let search_idle = match lookup("MGRAPH_SEARCH_IDLE_MS") {
            Some(raw) => Duration::from_millis(parse_u64("MGRAPH_SEARCH_IDLE_MS", &raw)?),
            None => defaults.search_idle,
        };
        let default_tz = lookup("MGRAPH_TZ").filter(|tz| !tz.is_empty());

        let settings = Self {
            base_url,
            index,
            timeout,
            search_idle,
            default_tz,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConsoleError::Config(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.index.is_empty() {
            return Err(ConsoleError::Config("index must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|e| ConsoleError::Config(format!("{} is not a number ({}): {}", key, raw, e)))
}
