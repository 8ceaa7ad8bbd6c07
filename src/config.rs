//! Configuration for the feed server and client.
//!
//! Both configs are plain builders with defaults that reproduce the demo
//! setup: a server on port 50051 emitting one delta per second per
//! subscription, and a client that subscribes to `AAPL` and `MSFT`, drops
//! `AAPL` after ten seconds and ends the session after twenty.
//!
//! `from_env()` constructors read `ORDERBOOK_FEED_*` variables on top of the
//! defaults; they are what the bundled binaries use.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Default server listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:50051";

/// Default server URL for the client
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:50051";

/// Configuration for the feed server
///
/// # Example
///
/// ```rust
/// use orderbook_feed::config::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_bind_addr("127.0.0.1:0".parse().unwrap())
///     .with_update_interval(Duration::from_millis(250));
///
/// assert_eq!(config.update_interval(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    bind_addr: SocketAddr,

    /// Pause between two incremental updates of one subscription
    update_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            update_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Load from `ORDERBOOK_FEED_BIND` and `ORDERBOOK_FEED_INTERVAL_MS`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("ORDERBOOK_FEED_BIND") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| Error::Config(format!("ORDERBOOK_FEED_BIND={}: {}", addr, e)))?;
        }
        if let Some(ms) = lookup("ORDERBOOK_FEED_INTERVAL_MS") {
            config.update_interval = parse_millis("ORDERBOOK_FEED_INTERVAL_MS", &ms)?;
        }
        Ok(config)
    }

    /// Set the listen address
    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// Set the pause between incremental updates
    #[must_use]
    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    /// Get the listen address
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Get the pause between incremental updates
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }
}

/// An unsubscribe the client sends at a fixed offset from session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnsubscribe {
    /// Offset from the start of the session
    pub after: Duration,
    /// Instrument to unsubscribe
    pub instrument_id: String,
}

/// Configuration for the feed client
///
/// # Example
///
/// ```rust
/// use orderbook_feed::config::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_server_url("ws://127.0.0.1:9000")
///     .with_instruments(["AAPL", "MSFT", "GOOG"])
///     .with_unsubscribe_after(Duration::from_secs(5), "GOOG")
///     .with_session_deadline(None);
///
/// assert_eq!(config.instruments().len(), 3);
/// assert!(config.server_url().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the feed server
    server_url: String,

    /// Instruments subscribed at session start, in order
    instruments: Vec<String>,

    /// Pause between two subscribe requests
    subscribe_pacing: Duration,

    /// Unsubscribes sent later in the session
    unsubscribes: Vec<ScheduledUnsubscribe>,

    /// Connection establishment timeout
    connect_timeout: Duration,

    /// When set, the client closes the session after this long
    session_deadline: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            instruments: vec!["AAPL".to_string(), "MSFT".to_string()],
            subscribe_pacing: Duration::from_millis(100),
            unsubscribes: vec![ScheduledUnsubscribe {
                after: Duration::from_secs(10),
                instrument_id: "AAPL".to_string(),
            }],
            connect_timeout: Duration::from_secs(10),
            session_deadline: Some(Duration::from_secs(20)),
        }
    }
}

impl ClientConfig {
    /// Load from environment variables on top of the defaults
    ///
    /// - `ORDERBOOK_FEED_URL` - server URL (`ws://` or `wss://`)
    /// - `ORDERBOOK_FEED_INSTRUMENTS` - comma-separated instrument ids
    /// - `ORDERBOOK_FEED_PACING_MS` - pause between subscribe requests
    /// - `ORDERBOOK_FEED_UNSUBSCRIBE` - comma-separated `ID@MILLIS` pairs
    ///   (empty string disables unsubscribes)
    /// - `ORDERBOOK_FEED_DEADLINE_MS` - session deadline (`0` disables it)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::InvalidUrl`] on bad values.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ORDERBOOK_FEED_URL") {
            config.server_url = url;
            config.server_url()?;
        }
        if let Some(list) = lookup("ORDERBOOK_FEED_INSTRUMENTS") {
            config.instruments = split_list(&list).map(str::to_string).collect();
        }
        if let Some(ms) = lookup("ORDERBOOK_FEED_PACING_MS") {
            config.subscribe_pacing = parse_millis("ORDERBOOK_FEED_PACING_MS", &ms)?;
        }
        if let Some(plan) = lookup("ORDERBOOK_FEED_UNSUBSCRIBE") {
            config.unsubscribes = split_list(&plan)
                .map(parse_unsubscribe)
                .collect::<Result<_, _>>()?;
        }
        if let Some(ms) = lookup("ORDERBOOK_FEED_DEADLINE_MS") {
            let deadline = parse_millis("ORDERBOOK_FEED_DEADLINE_MS", &ms)?;
            config.session_deadline = (!deadline.is_zero()).then_some(deadline);
        }

        Ok(config)
    }

    /// Set the server URL
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the instruments to subscribe to
    #[must_use]
    pub fn with_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instruments = instruments.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pause between subscribe requests
    #[must_use]
    pub fn with_subscribe_pacing(mut self, pacing: Duration) -> Self {
        self.subscribe_pacing = pacing;
        self
    }

    /// Schedule an unsubscribe `after` the session starts
    #[must_use]
    pub fn with_unsubscribe_after(mut self, after: Duration, instrument_id: impl Into<String>) -> Self {
        self.unsubscribes.push(ScheduledUnsubscribe {
            after,
            instrument_id: instrument_id.into(),
        });
        self
    }

    /// Drop every scheduled unsubscribe
    #[must_use]
    pub fn without_unsubscribes(mut self) -> Self {
        self.unsubscribes.clear();
        self
    }

    /// Set the connection timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set or clear the session deadline
    #[must_use]
    pub fn with_session_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.session_deadline = deadline;
        self
    }

    /// Get the validated server URL
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse or is not `ws://` / `wss://`.
    pub fn server_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.server_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::Config(format!(
                "server URL scheme must be ws or wss, got {}",
                other
            ))),
        }
    }

    /// Get the instruments subscribed at session start
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    /// Get the pause between subscribe requests
    pub fn subscribe_pacing(&self) -> Duration {
        self.subscribe_pacing
    }

    /// Get the scheduled unsubscribes, in configuration order
    pub fn unsubscribes(&self) -> &[ScheduledUnsubscribe] {
        &self.unsubscribes
    }

    /// Get the connection timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Get the session deadline
    pub fn session_deadline(&self) -> Option<Duration> {
        self.session_deadline
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, Error> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| Error::Config(format!("{}={}: {}", key, raw, e)))
}

fn parse_unsubscribe(entry: &str) -> Result<ScheduledUnsubscribe, Error> {
    let (instrument_id, ms) = entry.split_once('@').ok_or_else(|| {
        Error::Config(format!(
            "ORDERBOOK_FEED_UNSUBSCRIBE entry {:?} is not ID@MILLIS",
            entry
        ))
    })?;
    Ok(ScheduledUnsubscribe {
        after: parse_millis("ORDERBOOK_FEED_UNSUBSCRIBE", ms)?,
        instrument_id: instrument_id.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr().to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.update_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("ORDERBOOK_FEED_BIND", "127.0.0.1:7000"),
            ("ORDERBOOK_FEED_INTERVAL_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr().port(), 7000);
        assert_eq!(config.update_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_server_config_rejects_bad_values() {
        let err = ServerConfig::from_lookup(lookup(&[("ORDERBOOK_FEED_BIND", "nowhere")]));
        assert!(matches!(err, Err(Error::Config(_))));

        let err = ServerConfig::from_lookup(lookup(&[("ORDERBOOK_FEED_INTERVAL_MS", "-1")]));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_client_config() {
        let config = ClientConfig::default();
        assert_eq!(config.instruments(), ["AAPL", "MSFT"]);
        assert_eq!(config.subscribe_pacing(), Duration::from_millis(100));
        assert_eq!(config.unsubscribes().len(), 1);
        assert_eq!(config.unsubscribes()[0].instrument_id, "AAPL");
        assert_eq!(config.session_deadline(), Some(Duration::from_secs(20)));
        assert_eq!(config.server_url().unwrap().port(), Some(50051));
    }

    #[test]
    fn test_client_config_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("ORDERBOOK_FEED_URL", "ws://10.0.0.1:9000"),
            ("ORDERBOOK_FEED_INSTRUMENTS", "ES, NQ ,,CL"),
            ("ORDERBOOK_FEED_UNSUBSCRIBE", "NQ@1500,CL@3000"),
            ("ORDERBOOK_FEED_DEADLINE_MS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.instruments(), ["ES", "NQ", "CL"]);
        assert_eq!(
            config.unsubscribes()[0],
            ScheduledUnsubscribe {
                after: Duration::from_millis(1500),
                instrument_id: "NQ".to_string(),
            }
        );
        assert_eq!(config.unsubscribes().len(), 2);
        assert_eq!(config.session_deadline(), None);
    }

    #[test]
    fn test_client_config_rejects_http_url() {
        let err = ClientConfig::from_lookup(lookup(&[("ORDERBOOK_FEED_URL", "http://host")]));
        assert!(matches!(err, Err(Error::Config(_))));

        let err = ClientConfig::from_lookup(lookup(&[("ORDERBOOK_FEED_URL", "not a url")]));
        assert!(matches!(err, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_client_config_rejects_bad_unsubscribe() {
        let err = ClientConfig::from_lookup(lookup(&[("ORDERBOOK_FEED_UNSUBSCRIBE", "AAPL")]));
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::default()
            .without_unsubscribes()
            .with_unsubscribe_after(Duration::from_secs(1), "MSFT")
            .with_connect_timeout(Duration::from_secs(3))
            .with_subscribe_pacing(Duration::ZERO);

        assert_eq!(config.unsubscribes().len(), 1);
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.subscribe_pacing(), Duration::ZERO);
    }
}
