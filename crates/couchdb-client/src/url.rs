//! Request URL composition
//!
//! Pure helpers that join scheme, host, port, path and query parameters into
//! the absolute URL of a CouchDB request.

use std::fmt;
use std::str::FromStr;

/// URL scheme used to reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Plain HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(format!("unsupported scheme: {}", other)),
        }
    }
}

/// Build an absolute request URL
///
/// The path is joined with a single leading `/`. Query parameters are
/// percent-encoded and appended only when there is at least one, so a
/// request without parameters never ends in a bare `?`.
///
/// # Examples
/// ```
/// use couchdb_client::url::{build_url, Scheme};
///
/// let url = build_url(Scheme::Http, "127.0.0.1", 5984, "/mydb/doc1", &[]);
/// assert_eq!(url, "http://127.0.0.1:5984/mydb/doc1");
///
/// let params = vec![("rev".to_string(), "1-abc".to_string())];
/// let url = build_url(Scheme::Https, "couch.local", 6984, "mydb/doc1", &params);
/// assert_eq!(url, "https://couch.local:6984/mydb/doc1?rev=1-abc");
/// ```
pub fn build_url(
    scheme: Scheme,
    host: &str,
    port: u16,
    path: &str,
    params: &[(String, String)],
) -> String {
    let path = path.trim_start_matches('/');
    let mut url = format!("{}://{}:{}/{}", scheme, host, port, path);

    if !params.is_empty() {
        url.push('?');
        url.push_str(&encode_query(params));
    }

    url
}

/// Percent-encode query parameters as `key=value` pairs joined by `&`
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
