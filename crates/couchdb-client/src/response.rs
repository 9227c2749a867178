//! Response decoding and error classification
//!
//! CouchDB reports some failures (conflicts, validation errors, missing
//! documents) as a JSON `{error, reason}` envelope, and the status code is
//! not a reliable signal on its own. Responses are therefore decoded in two
//! phases: first as the shape the caller expects, and only when that fails
//! as a [`ServerError`], which is then wrapped in the error variant of the
//! calling [`Operation`]. If neither decode succeeds the original decode
//! error is returned unchanged.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// HTTP status CouchDB answers with when the session is missing or rejected
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// A fully buffered HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, keyed by lowercase name
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Create a new response
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Get a header value by case-insensitive name
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check whether the server rejected the request as unauthenticated
    pub fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    /// Check whether the body is empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// CouchDB's error envelope
///
/// # Examples
/// ```
/// use couchdb_client::ServerError;
///
/// let error: ServerError =
///     serde_json::from_str(r#"{"error":"conflict","reason":"Document update conflict."}"#).unwrap();
/// assert_eq!(error.error, "conflict");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code (e.g. "not_found", "conflict")
    pub error: String,
    /// Human-readable reason
    pub reason: String,
}

impl ServerError {
    /// Create a new server error
    pub fn new(error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.reason)
    }
}

/// The operation a response belongs to
///
/// Selects which [`Error`] variant wraps a decoded [`ServerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading documents, views or database listings
    Get,
    /// Inserting documents or creating databases
    Insert,
    /// Updating documents
    Update,
    /// Deleting documents or databases
    Delete,
    /// `_find` queries
    Find,
}

impl Operation {
    /// Wrap a server envelope in this operation's error variant
    pub fn wrap(self, error: ServerError) -> Error {
        match self {
            Operation::Get => Error::Get(error),
            Operation::Insert => Error::Insert(error),
            Operation::Update => Error::Update(error),
            Operation::Delete => Error::Delete(error),
            Operation::Find => Error::Find(error),
        }
    }
}

/// Decode a response into the expected success shape
///
/// 1. HTTP 401 fails with [`Error::Unauthorized`] whatever the body says.
/// 2. An empty body fails with [`Error::NoData`].
/// 3. The body is decoded as `T`.
/// 4. Failing that, as a [`ServerError`], wrapped by `operation`.
/// 5. Failing that too, the error from step 3 is returned.
pub fn decode<T>(response: &RawResponse, operation: Operation) -> Result<T>
where
    T: DeserializeOwned,
{
    if response.is_unauthorized() {
        return Err(Error::Unauthorized);
    }

    if response.is_empty() {
        return Err(Error::NoData);
    }

    decode_body(&response.body, operation)
}

/// Steps 3 to 5 of [`decode`] on a body that is known to be present
pub(crate) fn decode_body<T>(body: &[u8], operation: Operation) -> Result<T>
where
    T: DeserializeOwned,
{
    match serde_json::from_slice::<T>(body) {
        Ok(value) => Ok(value),
        Err(original) => match serde_json::from_slice::<ServerError>(body) {
            Ok(server_error) => {
                tracing::debug!(?operation, %server_error, "server returned an error envelope");
                Err(operation.wrap(server_error))
            }
            Err(_) => Err(Error::Json(original)),
        },
    }
}
