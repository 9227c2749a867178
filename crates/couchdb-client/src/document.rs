//! The capability of being stored as a CouchDB document

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can be stored in CouchDB
///
/// Implementors carry a required identifier (`_id`) and an optional revision
/// token (`_rev`). Documents are treated as immutable values: write operations
/// hand back a new value built by [`with_revision`](CouchDocument::with_revision)
/// rather than mutating the caller's copy.
///
/// # Examples
/// ```
/// use couchdb_client::CouchDocument;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Note {
///     #[serde(rename = "_id")]
///     id: String,
///     #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
///     rev: Option<String>,
///     text: String,
/// }
///
/// impl CouchDocument for Note {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn rev(&self) -> Option<&str> {
///         self.rev.as_deref()
///     }
///
///     fn with_revision(self, rev: impl Into<String>) -> Self {
///         Self { rev: Some(rev.into()), ..self }
///     }
/// }
///
/// let note = Note { id: "n1".into(), rev: None, text: "hi".into() };
/// let stored = note.clone().with_revision("1-abc");
/// assert_eq!(stored.rev(), Some("1-abc"));
/// assert_eq!(note.rev(), None);
/// ```
pub trait CouchDocument: Serialize + DeserializeOwned + Send + Sync {
    /// Document identifier
    fn id(&self) -> &str;

    /// Current revision token, if the document has been stored
    fn rev(&self) -> Option<&str>;

    /// Return this document with its revision replaced
    fn with_revision(self, rev: impl Into<String>) -> Self;

    /// The identifier, or [`Error::IdMissing`](crate::Error::IdMissing) when empty
    fn require_id(&self) -> crate::Result<&str> {
        match self.id() {
            "" => Err(crate::Error::IdMissing),
            id => Ok(id),
        }
    }

    /// The revision, or [`Error::RevMissing`](crate::Error::RevMissing) when absent or empty
    fn require_rev(&self) -> crate::Result<&str> {
        match self.rev() {
            Some(rev) if !rev.is_empty() => Ok(rev),
            _ => Err(crate::Error::RevMissing),
        }
    }
}
