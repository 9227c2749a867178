//! CouchDB Client Library
//!
//! This crate provides a typed client for the CouchDB REST API, including
//! cookie-based session authentication, request building, response decoding
//! into caller-defined document types, and classification of the server's
//! own `{error, reason}` envelopes.
//!
//! # Example
//!
//! ```rust,no_run
//! use couchdb_client::{ClientConfig, CouchClient, CouchDocument};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Person {
//!     #[serde(rename = "_id")]
//!     id: String,
//!     #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
//!     rev: Option<String>,
//!     name: String,
//! }
//!
//! impl CouchDocument for Person {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn rev(&self) -> Option<&str> {
//!         self.rev.as_deref()
//!     }
//!
//!     fn with_revision(self, rev: impl Into<String>) -> Self {
//!         Self { rev: Some(rev.into()), ..self }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 5984)
//!         .with_user_name("admin")
//!         .with_user_password("secret");
//!     let client = CouchClient::new(config)?;
//!
//!     let sam = Person { id: "sam".into(), rev: None, name: "Sam".into() };
//!     let sam = client.insert("people", sam).await?;
//!     println!("stored revision {:?}", sam.rev());
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod document;
pub mod models;
pub mod request;
pub mod response;
pub mod session;
pub mod transport;
pub mod url;

pub use client::CouchClient;
pub use config::ClientConfig;
pub use document::CouchDocument;
pub use models::{DatabaseOpResult, FindResult, UpdateResult, ViewResult, ViewRow};
pub use request::{CouchRequest, HttpMethod};
pub use response::{Operation, RawResponse, ServerError};
pub use session::{Session, SessionEvent};
pub use transport::{Ownership, ReqwestTransport, Transport, TransportRequest};
pub use url::Scheme;

/// Result type for CouchDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for CouchDB operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no identifier
    #[error("Document id is missing")]
    IdMissing,

    /// The document has no revision token
    #[error("Document revision is missing")]
    RevMissing,

    /// The server rejected the credentials or the session cookie (HTTP 401)
    #[error("Unauthorized")]
    Unauthorized,

    /// The response carried no body where one was required
    #[error("Response contained no data")]
    NoData,

    /// The server reported `ok: false` without an error envelope
    #[error("Unknown response from server")]
    UnknownResponse,

    /// Reading a document, view or database listing failed
    #[error("Get error: {0}")]
    Get(ServerError),

    /// Inserting a document or creating a database failed
    #[error("Insert error: {0}")]
    Insert(ServerError),

    /// Updating a document failed
    #[error("Update error: {0}")]
    Update(ServerError),

    /// Deleting a document or database failed
    #[error("Delete error: {0}")]
    Delete(ServerError),

    /// A `_find` query failed
    #[error("Find error: {0}")]
    Find(ServerError),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport owned by the client has already been shut down
    #[error("Transport has been shut down")]
    TransportClosed,
}

impl Error {
    /// The server's error envelope, if this error wraps one
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Error::Get(e)
            | Error::Insert(e)
            | Error::Update(e)
            | Error::Delete(e)
            | Error::Find(e) => Some(e),
            _ => None,
        }
    }
}
