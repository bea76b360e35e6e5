//! Configuration management for supaman.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "supaman";

/// Placeholder shown instead of the API key.
const REDACTED: &str = "<redacted>";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. `SUPABASE_URL` / `SUPABASE_ANON_KEY`
/// 2. Environment variables prefixed with `SUPAMAN_` (`__` separates sections,
///    e.g. `SUPAMAN_FEED__DEDUPE_BY_ID=false`)
/// 3. TOML config file at `~/.config/supaman/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection configuration.
    pub backend: BackendConfig,
    /// Realtime subscription configuration.
    pub realtime: RealtimeConfig,
    /// Feed behavior configuration.
    pub feed: FeedConfig,
}

/// Backend connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: Option<String>,
    /// Public (anon) API key.
    pub api_key: Option<String>,
    /// Database schema holding the missions table.
    pub schema: String,
    /// Name of the missions table.
    pub table: String,
    /// Timeout for REST requests in seconds.
    pub request_timeout_secs: u64,
}

/// Realtime subscription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Channel name joined on the realtime socket.
    pub channel: String,
    /// Interval between heartbeats in seconds.
    pub heartbeat_interval_secs: u64,
    /// Capacity of the insert event channel.
    pub event_buffer: usize,
}

/// Feed behavior configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Drop inserted records whose id is already in the feed.
    pub dedupe_by_id: bool,
    /// Attempts for the initial fetch before giving up.
    pub fetch_max_attempts: u32,
    /// Backoff before the first fetch retry in milliseconds.
    pub fetch_backoff_ms: u64,
    /// Upper bound on the fetch retry backoff in milliseconds.
    pub fetch_max_backoff_ms: u64,
}

/// Resolved connection credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Parsed project URL.
    pub url: Url,
    /// API key sent with every request.
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url.as_str())
            .field("api_key", &REDACTED)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            schema: "public".to_string(),
            table: "missions".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel: "realtime-missions".to_string(),
            heartbeat_interval_secs: 30,
            event_buffer: 64,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dedupe_by_id: true,
            fetch_max_attempts: 3,
            fetch_backoff_ms: 500,
            fetch_max_backoff_ms: 8_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("SUPAMAN_").split("__"))
            .merge(
                Env::raw()
                    .only(&["SUPABASE_URL", "SUPABASE_ANON_KEY"])
                    .map(|key| {
                        if key.as_str().eq_ignore_ascii_case("SUPABASE_URL") {
                            "backend.url".into()
                        } else {
                            "backend.api_key".into()
                        }
                    }),
            );

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Credentials are optional here; see [`Config::credentials`].
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.backend.url {
            parse_backend_url(url)?;
        }

        if self.backend.table.trim().is_empty() {
            return Err(Error::config_validation("backend.table must not be empty"));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(Error::config_validation(
                "backend.request_timeout_secs must be greater than 0",
            ));
        }

        if self.realtime.channel.trim().is_empty() {
            return Err(Error::config_validation(
                "realtime.channel must not be empty",
            ));
        }

        if self.realtime.heartbeat_interval_secs == 0 {
            return Err(Error::config_validation(
                "realtime.heartbeat_interval_secs must be greater than 0",
            ));
        }

        if self.realtime.event_buffer == 0 {
            return Err(Error::config_validation(
                "realtime.event_buffer must be greater than 0",
            ));
        }

        if self.feed.fetch_max_attempts == 0 {
            return Err(Error::config_validation(
                "feed.fetch_max_attempts must be greater than 0",
            ));
        }

        if self.feed.fetch_backoff_ms > self.feed.fetch_max_backoff_ms {
            return Err(Error::config_validation(format!(
                "feed.fetch_backoff_ms ({}) cannot be greater than feed.fetch_max_backoff_ms ({})",
                self.feed.fetch_backoff_ms, self.feed.fetch_max_backoff_ms
            )));
        }

        Ok(())
    }

    /// Resolve the backend credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or API key is missing or invalid.
    pub fn credentials(&self) -> Result<Credentials> {
        let url = self
            .backend
            .url
            .as_deref()
            .ok_or_else(|| Error::config_validation("backend.url is not set (or SUPABASE_URL)"))?;
        let api_key = self
            .backend
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::config_validation("backend.api_key is not set (or SUPABASE_ANON_KEY)")
            })?;

        Ok(Credentials {
            url: parse_backend_url(url)?,
            api_key: api_key.to_string(),
        })
    }

    /// A copy of this configuration that is safe to print.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.backend.api_key.is_some() {
            config.backend.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Get the REST request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    /// Get the heartbeat interval as a Duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.realtime.heartbeat_interval_secs)
    }

    /// Get the initial fetch backoff as a Duration.
    #[must_use]
    pub fn fetch_backoff(&self) -> Duration {
        Duration::from_millis(self.feed.fetch_backoff_ms)
    }

    /// Get the fetch backoff cap as a Duration.
    #[must_use]
    pub fn fetch_max_backoff(&self) -> Duration {
        Duration::from_millis(self.feed.fetch_max_backoff_ms)
    }
}

fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config_validation(format!("invalid backend.url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::config_validation(format!(
            "backend.url must use http or https, not '{other}'"
        ))),
    }
}
