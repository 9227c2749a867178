//! Test utilities and an in-memory CouchDB for end-to-end tests.
//!
//! [`FakeCouch`] answers the subset of the CouchDB HTTP API the client uses.
//! It keeps databases and documents in memory, hands out `N-<hex>`
//! revisions and rejects requests that do not carry the session cookie.

#![allow(dead_code)]

use couchdb_client::{ClientConfig, CouchClient, CouchDocument};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Admin user accepted by the fake server
pub const USER: &str = "admin";

/// Password accepted by the fake server
pub const PASSWORD: &str = "secret";

/// Cookie issued on login, without an expiry
pub const SESSION_COOKIE: &str = "AuthSession=YWRtaW46ZmFrZQ; Version=1; Path=/; HttpOnly";

/// Document type used throughout the end-to-end tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub name: String,
    pub age: u32,
}

impl Person {
    pub fn new(id: &str, name: &str, age: u32) -> Self {
        Self {
            id: id.to_string(),
            rev: None,
            name: name.to_string(),
            age,
        }
    }
}

impl CouchDocument for Person {
    fn id(&self) -> &str {
        &self.id
    }

    fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    fn with_revision(self, rev: impl Into<String>) -> Self {
        Self {
            rev: Some(rev.into()),
            ..self
        }
    }
}

#[derive(Debug, Default)]
struct State {
    databases: BTreeMap<String, HashMap<String, Value>>,
    logins: usize,
    revisions_issued: u64,
    cookie_revoked: bool,
}

impl State {
    fn next_rev(&mut self, generation: u64) -> String {
        self.revisions_issued += 1;
        format!("{}-{:032x}", generation, self.revisions_issued)
    }
}

/// In-memory CouchDB behind a wiremock server
#[derive(Debug, Clone, Default)]
pub struct FakeCouch {
    state: Arc<Mutex<State>>,
}

impl FakeCouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful logins served so far
    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }

    /// Reject the issued cookie until the next login, as a server restart would
    pub fn revoke_sessions(&self) {
        self.state.lock().unwrap().cookie_revoked = true;
    }

    /// Number of documents stored in a database
    pub fn document_count(&self, db: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .map_or(0, HashMap::len)
    }

    fn login(&self, request: &Request) -> ResponseTemplate {
        let form: HashMap<String, String> = form::decode_pairs(&request.body);
        let accepted = form.get("name").map(String::as_str) == Some(USER)
            && form.get("password").map(String::as_str) == Some(PASSWORD);

        if !accepted {
            return error(401, "unauthorized", "Name or password is incorrect.");
        }

        let mut state = self.state.lock().unwrap();
        state.logins += 1;
        state.cookie_revoked = false;
        ResponseTemplate::new(200)
            .insert_header("Set-Cookie", SESSION_COOKIE)
            .set_body_json(json!({"ok": true, "name": USER, "roles": ["_admin"]}))
    }

    fn database(&self, method: &str, db: &str) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let exists = state.databases.contains_key(db);

        match (method, exists) {
            ("HEAD", true) => ResponseTemplate::new(200),
            ("HEAD", false) => ResponseTemplate::new(404),
            ("PUT", true) => error(
                412,
                "file_exists",
                "The database could not be created, the file already exists.",
            ),
            ("PUT", false) => {
                state.databases.insert(db.to_string(), HashMap::new());
                ResponseTemplate::new(201).set_body_json(json!({"ok": true}))
            }
            ("DELETE", true) => {
                state.databases.remove(db);
                ResponseTemplate::new(200).set_body_json(json!({"ok": true}))
            }
            (_, false) => error(404, "not_found", "Database does not exist."),
            _ => error(405, "method_not_allowed", "Only GET,HEAD,POST,PUT,DELETE allowed"),
        }
    }

    fn insert(&self, db: &str, body: &[u8]) -> ResponseTemplate {
        let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(body) else {
            return error(400, "bad_request", "Document must be a JSON object");
        };
        let Some(id) = doc.get("_id").and_then(Value::as_str).map(str::to_string) else {
            return error(400, "bad_request", "Document id is required");
        };

        let mut state = self.state.lock().unwrap();
        if state.databases.get(db).is_some_and(|docs| docs.contains_key(&id)) {
            return error(409, "conflict", "Document update conflict.");
        }

        let rev = state.next_rev(1);
        doc.insert("_rev".to_string(), json!(rev));
        match state.databases.get_mut(db) {
            Some(docs) => {
                docs.insert(id.clone(), Value::Object(doc));
                ResponseTemplate::new(201).set_body_json(json!({"ok": true, "id": id, "rev": rev}))
            }
            None => error(404, "not_found", "Database does not exist."),
        }
    }

    fn find(&self, db: &str, body: &[u8]) -> ResponseTemplate {
        let query: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let Some(selector) = query.get("selector").and_then(Value::as_object) else {
            return error(400, "bad_request", "Missing required key: selector");
        };

        let state = self.state.lock().unwrap();
        let Some(docs) = state.databases.get(db) else {
            return error(404, "not_found", "Database does not exist.");
        };

        let mut matched: Vec<&Value> = docs
            .values()
            .filter(|doc| matches_selector(doc, selector))
            .collect();
        matched.sort_by_key(|doc| doc.get("_id").and_then(Value::as_str).map(str::to_string));

        ResponseTemplate::new(200).set_body_json(json!({ "docs": matched }))
    }

    fn document(&self, request: &Request, db: &str, id: &str) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        if !state.databases.contains_key(db) {
            return error(404, "not_found", "Database does not exist.");
        }
        let current = state
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .cloned();
        let current_rev = current
            .as_ref()
            .and_then(|doc| doc.get("_rev"))
            .and_then(Value::as_str)
            .map(str::to_string);

        match request.method.as_str() {
            "GET" => match current {
                Some(doc) => ResponseTemplate::new(200).set_body_json(doc),
                None => error(404, "not_found", "missing"),
            },
            "PUT" => {
                let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(&request.body)
                else {
                    return error(400, "bad_request", "Document must be a JSON object");
                };
                let given_rev = doc.get("_rev").and_then(Value::as_str).map(str::to_string);
                if given_rev != current_rev {
                    return error(409, "conflict", "Document update conflict.");
                }

                let rev = state.next_rev(generation(current_rev.as_deref()) + 1);
                doc.insert("_id".to_string(), json!(id));
                doc.insert("_rev".to_string(), json!(rev));
                if let Some(docs) = state.databases.get_mut(db) {
                    docs.insert(id.to_string(), Value::Object(doc));
                }
                ResponseTemplate::new(201).set_body_json(json!({"ok": true, "id": id, "rev": rev}))
            }
            "DELETE" => {
                if current.is_none() {
                    return error(404, "not_found", "missing");
                }
                let given_rev = request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "rev")
                    .map(|(_, value)| value.into_owned());
                if given_rev != current_rev {
                    return error(409, "conflict", "Document update conflict.");
                }

                let rev = state.next_rev(generation(current_rev.as_deref()) + 1);
                if let Some(docs) = state.databases.get_mut(db) {
                    docs.remove(id);
                }
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "id": id, "rev": rev}))
            }
            _ => error(405, "method_not_allowed", "Only DELETE,GET,HEAD,PUT allowed"),
        }
    }
}

impl Respond for FakeCouch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.as_str();
        let decoded: Vec<String> = request
            .url
            .path()
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .collect();
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

        if method == "POST" && segments == ["_session"] {
            return self.login(request);
        }

        let cookie = request
            .headers
            .get("cookie")
            .and_then(|value| value.to_str().ok());
        let revoked = self.state.lock().unwrap().cookie_revoked;
        if revoked || cookie != Some(SESSION_COOKIE) {
            return error(401, "unauthorized", "You are not authorized to access this db.");
        }

        match (method, segments.as_slice()) {
            ("GET", ["_all_dbs"]) => {
                let state = self.state.lock().unwrap();
                let names: Vec<String> = state.databases.keys().cloned().collect();
                ResponseTemplate::new(200).set_body_json(names)
            }
            ("POST", [db]) => self.insert(db, &request.body),
            (_, [db]) => self.database(method, db),
            ("POST", [db, "_find"]) => self.find(db, &request.body),
            (_, [db, id]) => self.document(request, db, id),
            _ => error(404, "not_found", "missing"),
        }
    }
}

/// Start a fake CouchDB and return it with a handle on its state
pub async fn start_fake_couch() -> (MockServer, FakeCouch) {
    let server = MockServer::start().await;
    let couch = FakeCouch::new();

    Mock::given(any())
        .respond_with(couch.clone())
        .mount(&server)
        .await;

    (server, couch)
}

/// Client configuration pointing at a mock server
pub fn config_for(server: &MockServer) -> ClientConfig {
    let address = server.address();
    ClientConfig::new(address.ip().to_string(), address.port())
        .with_user_name(USER)
        .with_user_password(PASSWORD)
}

/// Create a client carrying the fake server's credentials
pub fn create_test_client(server: &MockServer) -> CouchClient {
    CouchClient::new(config_for(server)).unwrap()
}

/// Route test logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn error(status: u16, error: &str, reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"error": error, "reason": reason}))
}

fn generation(rev: Option<&str>) -> u64 {
    rev.and_then(|rev| rev.split('-').next())
        .and_then(|generation| generation.parse().ok())
        .unwrap_or(0)
}

fn matches_selector(doc: &Value, selector: &Map<String, Value>) -> bool {
    selector
        .iter()
        .all(|(field, expected)| doc.get(field) == Some(expected))
}

mod form {
    use std::collections::HashMap;

    /// Decode an `application/x-www-form-urlencoded` body
    pub fn decode_pairs(body: &[u8]) -> HashMap<String, String> {
        String::from_utf8_lossy(body)
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (decode(key), decode(value)))
            .collect()
    }

    fn decode(value: &str) -> String {
        let value = value.replace('+', " ");
        urlencoding::decode(&value)
            .map(|decoded| decoded.into_owned())
            .unwrap_or(value)
    }
}
