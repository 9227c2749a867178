//! Response payloads returned by CouchDB endpoints
//!
//! All of these are read-only snapshots decoded from a single response body.

use serde::{Deserialize, Serialize};

/// Result of inserting, updating or deleting a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Whether the server applied the change
    #[serde(default)]
    pub ok: bool,
    /// Document identifier
    pub id: String,
    /// New revision token
    pub rev: String,
}

impl UpdateResult {
    /// The placeholder returned when a delete response has no body
    pub fn unconfirmed() -> Self {
        Self::default()
    }
}

/// Result of creating or deleting a database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOpResult {
    /// Whether the server applied the change
    pub ok: bool,
}

/// Documents matched by a `_find` query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResult<T> {
    /// Matching documents, in server order
    pub docs: Vec<T>,
    /// Continuation token for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
    /// Index warning, e.g. when no index covers the selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Rows of a view query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewResult<T> {
    /// Number of rows in the view, zero for reduced views
    #[serde(default)]
    pub total_rows: u64,
    /// Offset of the first returned row
    #[serde(default)]
    pub offset: u64,
    /// Returned rows
    pub rows: Vec<ViewRow<T>>,
}

impl<T> ViewResult<T> {
    /// Iterate over the row values
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|row| &row.value)
    }
}

/// A single view row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow<T> {
    /// Emitted value
    pub value: T,
    /// Source document id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Emitted key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<serde_json::Value>,
}

/// Payload of a successful `POST /_session`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct SessionResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}
