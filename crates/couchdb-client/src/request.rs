//! Request building and execution
//!
//! [`CouchRequest`] describes an operation relative to the server root.
//! [`execute`] turns it into a [`TransportRequest`] (absolute URL, content
//! type, session cookie) and sends it.

use crate::response::RawResponse;
use crate::transport::{Transport, TransportRequest};
use crate::url::encode_query;
use crate::{ClientConfig, Result};
use serde::Serialize;

/// Content type of JSON request bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type of the login form
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP method of a CouchDB request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request
    Get,
    /// HEAD request
    Head,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Convert to reqwest Method
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request relative to the server root
///
/// # Examples
/// ```
/// use couchdb_client::{CouchRequest, HttpMethod};
///
/// let request = CouchRequest::delete("/fortests/x").param("rev", "1-a");
/// assert_eq!(request.method, HttpMethod::Delete);
/// assert_eq!(request.params, vec![("rev".to_string(), "1-a".to_string())]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path below the server root (e.g. "/mydb/doc1")
    pub path: String,
    /// Query parameters in order
    pub params: Vec<(String, String)>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Content type sent with the request
    pub encoding: String,
}

impl CouchRequest {
    /// Create a request with the given method and path
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
            encoding: JSON_CONTENT_TYPE.to_string(),
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Create a HEAD request
    pub fn head(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Create a PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add several query parameters
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the request body from JSON
    pub fn json_body<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        self.encoding = JSON_CONTENT_TYPE.to_string();
        Ok(self)
    }

    /// Set a url-form-encoded body from key/value pairs
    pub fn form_body(mut self, fields: &[(String, String)]) -> Self {
        self.body = Some(encode_query(fields).into_bytes());
        self.encoding = FORM_CONTENT_TYPE.to_string();
        self
    }

    /// Set encoding type
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Build the wire request for a server
    ///
    /// The content type is always sent. The session cookie is attached when
    /// given, without any expiry check.
    pub fn into_transport_request(
        self,
        config: &ClientConfig,
        cookie: Option<String>,
    ) -> TransportRequest {
        let url = config.url(&self.path, &self.params);

        let mut headers = Vec::with_capacity(self.headers.len() + 2);
        headers.push(("Content-Type".to_string(), self.encoding));
        headers.extend(self.headers);
        if let Some(cookie) = cookie {
            headers.push(("Cookie".to_string(), cookie));
        }

        TransportRequest {
            method: self.method,
            url,
            headers,
            body: self.body,
            timeout: config.request_timeout,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

/// Send a request through a transport
///
/// Transport failures propagate unchanged.
pub async fn execute(
    transport: &dyn Transport,
    config: &ClientConfig,
    cookie: Option<String>,
    request: CouchRequest,
) -> Result<RawResponse> {
    let request = request.into_transport_request(config, cookie);
    let method = request.method;
    let url = request.url.clone();

    tracing::debug!(method = method.as_str(), %url, "sending request");
    let response = transport.send(request).await?;
    tracing::debug!(
        method = method.as_str(),
        %url,
        status = response.status,
        bytes = response.body.len(),
        "received response"
    );

    Ok(response)
}

/// Path of a database, with the name percent-encoded
pub(crate) fn db_path(db: &str) -> String {
    format!("/{}", urlencoding::encode(db))
}

/// Path below a database
///
/// `uri` is taken as given, so it may name a view or carry its own encoding.
pub(crate) fn doc_path(db: &str, uri: &str) -> String {
    format!("{}/{}", db_path(db), uri.trim_start_matches('/'))
}

/// Path of a document by id
///
/// The id is percent-encoded as a single segment. The `_design/` and
/// `_local/` prefixes keep their slash, as CouchDB routes them.
pub(crate) fn document_path(db: &str, id: &str) -> String {
    let segment = match id.split_once('/') {
        Some((prefix @ ("_design" | "_local"), name)) => {
            format!("{}/{}", prefix, urlencoding::encode(name))
        }
        _ => urlencoding::encode(id).into_owned(),
    };
    doc_path(db, &segment)
}
