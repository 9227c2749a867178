//! CouchClient - main client for the CouchDB REST API
//!
//! The client owns the configuration, the session store and a handle to the
//! HTTP transport. Every operation authenticates lazily: a usable session
//! is reused, otherwise `POST /_session` runs first and its cookie is
//! attached to the request that follows.
//!
//! # Example
//!
//! ```rust,no_run
//! use couchdb_client::{ClientConfig, CouchClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CouchClient::new(ClientConfig::new("127.0.0.1", 5984))?;
//!
//!     for db in client.list_databases().await? {
//!         println!("{}", db);
//!     }
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::document::CouchDocument;
use crate::models::{DatabaseOpResult, FindResult, SessionResponse, UpdateResult, ViewResult};
use crate::request::{self, db_path, doc_path, document_path, CouchRequest};
use crate::response::{decode, decode_body, Operation, RawResponse, ServerError};
use crate::session::{Session, SessionCallback, SessionEvent, SessionStore};
use crate::transport::{Ownership, ReqwestTransport, Transport};
use crate::{ClientConfig, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Client for a CouchDB server
///
/// `CouchClient` is `Send + Sync`; share one instance (e.g. behind an `Arc`)
/// between concurrent tasks. Concurrent operations that find no usable
/// session may each log in; the last session written wins and both cookies
/// stay valid.
pub struct CouchClient {
    /// Configuration, read-only after construction
    config: ClientConfig,
    /// HTTP transport
    transport: Arc<dyn Transport>,
    /// Whether `shutdown` releases the transport
    ownership: Ownership,
    /// Current session
    session: SessionStore,
    /// Session event callback
    session_callback: Option<SessionCallback>,
}

impl std::fmt::Debug for CouchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchClient")
            .field("config", &self.config)
            .field("ownership", &self.ownership)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl CouchClient {
    /// Create a client with its own `reqwest` transport
    ///
    /// The transport is released by [`shutdown`](Self::shutdown).
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport), Ownership::Owned))
    }

    /// Create a client on top of a caller-managed transport
    ///
    /// [`shutdown`](Self::shutdown) leaves a shared transport running.
    pub fn with_shared_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_transport(config, transport, Ownership::Shared)
    }

    /// Create a client with an explicit transport ownership
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        ownership: Ownership,
    ) -> Self {
        Self {
            config,
            transport,
            ownership,
            session: SessionStore::new(),
            session_callback: None,
        }
    }

    /// Set a callback for session events
    ///
    /// The callback runs after every successful login.
    pub fn set_session_callback<F>(&mut self, callback: F)
    where
        F: Fn(SessionEvent, &Session) + Send + Sync + 'static,
    {
        self.session_callback = Some(Arc::new(callback));
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the current session, expired or not
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.current()
    }

    /// Check if there's a usable session
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Check whether [`shutdown`](Self::shutdown) releases the transport
    pub fn owns_transport(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Return the current session, logging in if none is usable
    ///
    /// A usable session is returned without any network traffic.
    pub async fn ensure_authenticated(&self) -> Result<Arc<Session>> {
        match self.session.usable() {
            Some(session) => Ok(session),
            None => self.authenticate().await,
        }
    }

    /// Log in with the configured credentials and replace the session
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] when the server answers 401
    /// - [`Error::UnknownResponse`] on any other non-2xx status
    /// - [`Error::NoData`] when the response has no body
    /// - [`Error::Json`] when the body is not a session payload
    pub async fn authenticate(&self) -> Result<Arc<Session>> {
        let form = [
            ("name".to_string(), self.config.user_name.clone()),
            ("password".to_string(), self.config.user_password.clone()),
        ];
        let login = CouchRequest::post("/_session").form_body(&form);

        let response = request::execute(self.transport.as_ref(), &self.config, None, login).await?;

        if response.is_unauthorized() {
            tracing::warn!(user = %self.config.user_name, "login rejected");
            return Err(Error::Unauthorized);
        }
        if !response.is_success() {
            let reason = serde_json::from_slice::<ServerError>(&response.body).ok();
            tracing::warn!(status = response.status, ?reason, "login failed");
            return Err(Error::UnknownResponse);
        }
        if response.is_empty() {
            return Err(Error::NoData);
        }

        let payload: SessionResponse = serde_json::from_slice(&response.body)?;
        let session = Arc::new(Session::from_login(response.header("set-cookie"), payload));

        let event = match self.session.replace(Arc::clone(&session)) {
            Some(_) => SessionEvent::Renewed,
            None => SessionEvent::Created,
        };

        tracing::info!(
            user = ?session.user_name,
            expires = ?session.cookie_expiry,
            ?event,
            "session established"
        );

        if let Some(ref callback) = self.session_callback {
            callback(event, &session);
        }

        Ok(session)
    }

    /// Send an authenticated request and return the undecoded response
    ///
    /// Useful for endpoints without a dedicated method. A 401 drops the
    /// session whose cookie was sent, so the next request logs in again.
    /// The rejected request itself is not retried.
    pub async fn send(&self, request: CouchRequest) -> Result<RawResponse> {
        let session = self.ensure_authenticated().await?;
        let cookie = session.cookie_header().map(str::to_string);
        let response =
            request::execute(self.transport.as_ref(), &self.config, cookie, request).await?;

        if response.is_unauthorized() && self.session.invalidate(&session) {
            tracing::warn!(
                user = ?session.user_name,
                "session cookie rejected, dropping session"
            );
        }

        Ok(response)
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// List all databases (`GET /_all_dbs`)
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let response = self.send(CouchRequest::get("/_all_dbs")).await?;
        decode(&response, Operation::Get)
    }

    /// Check whether a database exists (`HEAD /{db}`)
    pub async fn database_exists(&self, db: &str) -> Result<bool> {
        let response = self.send(CouchRequest::head(db_path(db))).await?;
        if response.is_unauthorized() {
            return Err(Error::Unauthorized);
        }
        Ok(response.status == 200)
    }

    /// Create a database (`PUT /{db}`)
    pub async fn create_database(&self, db: &str) -> Result<DatabaseOpResult> {
        let response = self.send(CouchRequest::put(db_path(db))).await?;
        decode(&response, Operation::Insert)
    }

    /// Delete a database (`DELETE /{db}`)
    pub async fn delete_database(&self, db: &str) -> Result<DatabaseOpResult> {
        let response = self.send(CouchRequest::delete(db_path(db))).await?;
        decode(&response, Operation::Delete)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a document or view and decode it as `T` (`GET /{db}/{uri}`)
    ///
    /// `uri` may be a document id or a view path such as
    /// `_design/people/_view/by_name`.
    pub async fn get<T>(&self, db: &str, uri: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.get_raw(db, uri, query).await?;
        decode(&response, Operation::Get)
    }

    /// Get a document or view without decoding it
    pub async fn get_raw(
        &self,
        db: &str,
        uri: &str,
        query: &[(&str, &str)],
    ) -> Result<RawResponse> {
        let request = CouchRequest::get(doc_path(db, uri)).params(query.iter().copied());
        self.send(request).await
    }

    /// Get a document by id
    pub async fn get_document<T>(&self, db: &str, id: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if id.is_empty() {
            return Err(Error::IdMissing);
        }
        let response = self.send(CouchRequest::get(document_path(db, id))).await?;
        decode(&response, Operation::Get)
    }

    /// Query a view (`GET /{db}/_design/{design}/_view/{view}`)
    pub async fn query_view<T>(
        &self,
        db: &str,
        design: &str,
        view: &str,
        query: &[(&str, &str)],
    ) -> Result<ViewResult<T>>
    where
        T: DeserializeOwned,
    {
        let uri = format!(
            "_design/{}/_view/{}",
            urlencoding::encode(design),
            urlencoding::encode(view)
        );
        self.get(db, &uri, query).await
    }

    /// Find documents matching a selector (`POST /{db}/_find`)
    ///
    /// `body` is the full `_find` request, e.g.
    /// `{"selector": {"name": "Sam"}}`.
    pub async fn find<T, S>(&self, db: &str, body: &S) -> Result<FindResult<T>>
    where
        T: DeserializeOwned,
        S: Serialize + ?Sized,
    {
        let response = self.find_raw(db, body).await?;
        decode(&response, Operation::Find)
    }

    /// Run a `_find` query without decoding the response
    pub async fn find_raw<S>(&self, db: &str, body: &S) -> Result<RawResponse>
    where
        S: Serialize + ?Sized,
    {
        let request = CouchRequest::post(doc_path(db, "_find")).json_body(body)?;
        self.send(request).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a new document (`POST /{db}`)
    ///
    /// Returns the document carrying the revision assigned by the server.
    pub async fn insert<D>(&self, db: &str, doc: D) -> Result<D>
    where
        D: CouchDocument,
    {
        doc.require_id()?;

        let request = CouchRequest::post(db_path(db)).json_body(&doc)?;
        let response = self.send(request).await?;
        let result: UpdateResult = decode(&response, Operation::Insert)?;

        Self::apply_result(doc, result)
    }

    /// Update an existing document (`PUT /{db}/{id}`)
    ///
    /// The document must carry its current revision. Returns the document
    /// carrying the new revision.
    pub async fn update<D>(&self, db: &str, doc: D) -> Result<D>
    where
        D: CouchDocument,
    {
        doc.require_rev()?;
        let id = doc.require_id()?;

        let request = CouchRequest::put(document_path(db, id)).json_body(&doc)?;
        let response = self.send(request).await?;
        let result: UpdateResult = decode(&response, Operation::Update)?;

        Self::apply_result(doc, result)
    }

    /// Delete a document (`DELETE /{db}/{id}?rev={rev}`)
    pub async fn delete<D>(&self, db: &str, doc: &D) -> Result<UpdateResult>
    where
        D: CouchDocument,
    {
        let id = doc.require_id()?;
        let rev = doc.require_rev()?;
        self.delete_by_id(db, id, rev).await
    }

    /// Delete a document by id and revision
    ///
    /// A response without a body yields an unconfirmed result
    /// (`ok: false`, empty id and rev) instead of an error.
    pub async fn delete_by_id(&self, db: &str, id: &str, rev: &str) -> Result<UpdateResult> {
        if id.is_empty() {
            return Err(Error::IdMissing);
        }
        if rev.is_empty() {
            return Err(Error::RevMissing);
        }

        let request = CouchRequest::delete(document_path(db, id)).param("rev", rev);
        let response = self.send(request).await?;

        if response.is_unauthorized() {
            return Err(Error::Unauthorized);
        }
        if response.is_empty() {
            tracing::debug!(db, id, "delete response had no body");
            return Ok(UpdateResult::unconfirmed());
        }

        decode_body(&response.body, Operation::Delete)
    }

    /// Turn a write result into the stored document
    fn apply_result<D>(doc: D, result: UpdateResult) -> Result<D>
    where
        D: CouchDocument,
    {
        if !result.ok {
            return Err(Error::UnknownResponse);
        }
        if result.id != doc.id() {
            tracing::warn!(
                expected = doc.id(),
                actual = %result.id,
                "server stored document under a different id"
            );
        }
        Ok(doc.with_revision(result.rev))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Shut the client down
    ///
    /// An owned transport is shut down; a shared one is left untouched.
    pub async fn shutdown(self) -> Result<()> {
        match self.ownership {
            Ownership::Owned => self.transport.shutdown().await,
            Ownership::Shared => {
                tracing::debug!("leaving shared transport running");
                Ok(())
            }
        }
    }
}
