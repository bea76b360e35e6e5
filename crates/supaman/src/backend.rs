//! Shared connection to the hosted backend.
//!
//! A [`BackendClient`] bundles the HTTP connection pool with the project URL,
//! API key and table coordinates. The binary builds exactly one at startup
//! through [`init`]; stores receive it as an `Arc` and never look it up
//! themselves.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;
use url::Url;

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};

/// Protocol version requested on the realtime socket.
const REALTIME_VSN: &str = "1.0.0";

static GLOBAL: OnceLock<Arc<BackendClient>> = OnceLock::new();

/// Connection details and HTTP pool for one backend project.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    schema: String,
    table: String,
    channel: String,
    request_timeout: Duration,
    heartbeat_interval: Duration,
    event_buffer: usize,
}

impl BackendClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the credentials are
    /// missing, or the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let Credentials { url, api_key } = config.credentials()?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&api_key)
            .map_err(|e| Error::config_validation(format!("backend.api_key is not a valid header: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| Error::config_validation(format!("backend.api_key is not a valid header: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        debug!(url = %url, table = %config.backend.table, "backend client created");

        Ok(Self {
            http,
            base_url: url,
            api_key,
            schema: config.backend.schema.clone(),
            table: config.backend.table.clone(),
            channel: config.realtime.channel.clone(),
            request_timeout: config.request_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            event_buffer: config.realtime.event_buffer,
        })
    }

    /// The pooled HTTP client (default auth headers included).
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The project base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The database schema holding the missions table.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The missions table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The realtime channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Deadline for one REST request or for opening the realtime socket.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Interval between realtime heartbeats.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Capacity of the insert event channel.
    #[must_use]
    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }

    /// REST endpoint for the missions table.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn table_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config_validation("backend.url cannot be a base URL"))?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);
        Ok(url)
    }

    /// Websocket endpoint for realtime subscriptions.
    ///
    /// `http` maps to `ws` and `https` to `wss`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be converted.
    pub fn realtime_url(&self) -> Result<Url> {
        let mut url = self.base_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::config_validation("backend.url cannot be used for websockets"))?;
        url.path_segments_mut()
            .map_err(|()| Error::config_validation("backend.url cannot be a base URL"))?
            .pop_if_empty()
            .extend(["realtime", "v1", "websocket"]);
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", REALTIME_VSN);
        Ok(url)
    }
}

/// Initialize the process-wide backend client.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] on a second call, or any error from
/// [`BackendClient::new`].
pub fn init(config: &Config) -> Result<Arc<BackendClient>> {
    if GLOBAL.get().is_some() {
        return Err(Error::AlreadyInitialized);
    }
    let client = Arc::new(BackendClient::new(config)?);
    GLOBAL
        .set(Arc::clone(&client))
        .map_err(|_| Error::AlreadyInitialized)?;
    Ok(client)
}

/// The process-wide backend client.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] before [`init`] has succeeded.
pub fn global() -> Result<Arc<BackendClient>> {
    GLOBAL.get().cloned().ok_or(Error::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(url: &str) -> Config {
        let mut config = Config::default();
        config.backend.url = Some(url.to_string());
        config.backend.api_key = Some("anon-key".to_string());
        config
    }

    #[test]
    fn test_new_requires_credentials() {
        let err = BackendClient::new(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_table_url() {
        let client = BackendClient::new(&test_config("https://abc.supabase.co")).unwrap();
        assert_eq!(
            client.table_url().unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/missions"
        );
    }

    #[test]
    fn test_table_url_with_trailing_slash() {
        let client = BackendClient::new(&test_config("http://localhost:54321/")).unwrap();
        assert_eq!(
            client.table_url().unwrap().as_str(),
            "http://localhost:54321/rest/v1/missions"
        );
    }

    #[test]
    fn test_realtime_url_secure() {
        let client = BackendClient::new(&test_config("https://abc.supabase.co")).unwrap();
        assert_eq!(
            client.realtime_url().unwrap().as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_plain() {
        let client = BackendClient::new(&test_config("http://127.0.0.1:54321")).unwrap();
        assert_eq!(
            client.realtime_url().unwrap().as_str(),
            "ws://127.0.0.1:54321/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );
    }

    #[test]
    fn test_accessors() {
        let client = BackendClient::new(&test_config("https://abc.supabase.co")).unwrap();
        assert_eq!(client.api_key(), "anon-key");
        assert_eq!(client.schema(), "public");
        assert_eq!(client.table(), "missions");
        assert_eq!(client.channel(), "realtime-missions");
        assert_eq!(client.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(client.event_buffer(), 64);
        assert_eq!(client.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_new_rejects_zero_event_buffer() {
        let mut config = test_config("https://abc.supabase.co");
        config.realtime.event_buffer = 0;
        let err = BackendClient::new(&config).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_new_rejects_zero_heartbeat_interval() {
        let mut config = test_config("https://abc.supabase.co");
        config.realtime.heartbeat_interval_secs = 0;
        let err = BackendClient::new(&config).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_global_lifecycle() {
        // The only test in this crate that touches the global client.
        assert!(matches!(global(), Err(Error::NotInitialized)));

        let config = test_config("https://abc.supabase.co");
        let client = init(&config).unwrap();
        assert!(Arc::ptr_eq(&client, &global().unwrap()));

        assert!(matches!(init(&config), Err(Error::AlreadyInitialized)));
    }
}
