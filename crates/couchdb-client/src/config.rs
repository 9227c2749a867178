//! Client configuration
//!
//! [`ClientConfig`] is the construction surface of a [`CouchClient`](crate::CouchClient).
//! It is immutable once handed to the client.
//!
//! | Option | Default | Environment |
//! |--------|---------|-------------|
//! | `scheme` | `http` | `COUCHDB_PROTOCOL` |
//! | `host` | `127.0.0.1` | `COUCHDB_HOST` |
//! | `port` | `5984` | `COUCHDB_PORT` |
//! | `user_name` | `admin` | `COUCHDB_USER` |
//! | `user_password` | `$COUCHDB_PASS` or empty | `COUCHDB_PASS` |
//! | `request_timeout` | 30 s | `COUCHDB_TIMEOUT_SECS` |
//! | `max_body_bytes` | 10 MiB | not read |

use crate::url::{build_url, Scheme};
use std::fmt;
use std::time::Duration;

/// Environment variable consulted for the password when none is given
pub const PASSWORD_ENV_VAR: &str = "COUCHDB_PASS";

/// Default CouchDB port
pub const DEFAULT_PORT: u16 = 5984;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling for buffering a response body without `Content-Length`
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for a CouchDB client
#[derive(Clone)]
pub struct ClientConfig {
    /// URL scheme
    pub scheme: Scheme,
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// User name for the session login
    pub user_name: String,
    /// Password for the session login
    pub user_password: String,
    /// Timeout applied to every request
    pub request_timeout: Duration,
    /// Upper bound for buffering a response body of unknown length
    pub max_body_bytes: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Http,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            user_name: "admin".to_string(),
            user_password: std::env::var(PASSWORD_ENV_VAR).unwrap_or_default(),
            request_timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: format!("couchdb-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user_name", &self.user_name)
            .field("user_password", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new config for a host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Build a config from `COUCHDB_*` environment variables
    ///
    /// Variables that are unset or unparsable fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(scheme) = env_var("COUCHDB_PROTOCOL").and_then(|v| v.parse().ok()) {
            config.scheme = scheme;
        }
        if let Some(host) = env_var("COUCHDB_HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("COUCHDB_PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(user) = env_var("COUCHDB_USER") {
            config.user_name = user;
        }
        if let Some(secs) = env_var("COUCHDB_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Set the URL scheme
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the user name
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    /// Set the password explicitly, overriding `COUCHDB_PASS`
    pub fn with_user_password(mut self, user_password: impl Into<String>) -> Self {
        self.user_password = user_password.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the request timeout in whole seconds
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Set the body buffering ceiling
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Absolute URL for a path and query on the configured server
    pub fn url(&self, path: &str, params: &[(String, String)]) -> String {
        build_url(self.scheme, &self.host, self.port, path, params)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
