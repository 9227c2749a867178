//! CouchDB cookie session management
//!
//! This module implements the client side of CouchDB's cookie authentication:
//! - The [`Session`] established by `POST /_session`
//! - Cookie expiry parsing from the `Set-Cookie` header
//! - The [`SessionStore`] that holds the current session
//! - Session event callbacks
//!
//! A session without a parsable expiry never expires on the client side.
//! Such a cookie is reused until the server answers 401, which reaches the
//! caller as [`Error::Unauthorized`](crate::Error::Unauthorized).
//!
//! # Example
//!
//! ```rust
//! use couchdb_client::session::parse_cookie_expiry;
//!
//! let cookie = "AuthSession=YWRtaW46; Version=1; Expires=Tue, 15 Jan 2030 10:00:00 GMT; Path=/";
//! let expiry = parse_cookie_expiry(cookie).unwrap();
//! assert_eq!(expiry.to_rfc3339(), "2030-01-15T10:00:00+00:00");
//! ```

mod store;

pub use store::SessionStore;

use crate::models::SessionResponse;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Legacy Netscape cookie date layout, `E, dd-MMM-yyyy HH:mm:ss`, zone handled separately
const LEGACY_COOKIE_DATE: &str = "%a, %d-%b-%Y %H:%M:%S";

/// An authenticated CouchDB session
///
/// Sessions are replaced wholesale on every login and never mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Whether the server reported the login as successful
    pub authenticated: bool,
    /// User name echoed back by the server
    pub user_name: Option<String>,
    /// Roles granted to the user
    pub roles: Vec<String>,
    /// `Set-Cookie` header value, verbatim
    pub cookie_value: String,
    /// When the cookie stops being valid, if known
    pub cookie_expiry: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a session from the login response
    pub(crate) fn from_login(set_cookie: Option<&str>, response: SessionResponse) -> Self {
        let cookie_value = set_cookie.unwrap_or_default().to_string();
        let cookie_expiry = parse_cookie_expiry(&cookie_value);

        Self {
            authenticated: response.ok,
            user_name: response.name,
            roles: response.roles.unwrap_or_default(),
            cookie_value,
            cookie_expiry,
        }
    }

    /// Check whether the cookie can still be used
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Check whether the cookie can be used at the given instant
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match self.cookie_expiry {
            Some(expiry) => expiry > now,
            None => true,
        }
    }

    /// Value for the `Cookie` request header, if the server issued one
    pub fn cookie_header(&self) -> Option<&str> {
        Some(self.cookie_value.as_str()).filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.authenticated)
            .field("user_name", &self.user_name)
            .field("roles", &self.roles)
            .field("cookie_value", &"<redacted>")
            .field("cookie_expiry", &self.cookie_expiry)
            .finish()
    }
}

/// Session event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// First session of the client
    Created,
    /// A session replaced an earlier one
    Renewed,
}

/// Callback function type for session events
pub type SessionCallback = Arc<dyn Fn(SessionEvent, &Session) + Send + Sync>;

/// Determine when a `Set-Cookie` value expires
///
/// The `Expires` attribute is first read as an RFC 1123 HTTP-date. When that
/// fails, the raw string is scanned for an `Expires=` segment in the legacy
/// `E, dd-MMM-yyyy HH:mm:ss z` layout. Returns `None` when neither works.
pub fn parse_cookie_expiry(set_cookie: &str) -> Option<DateTime<Utc>> {
    expires_attribute(set_cookie)
        .and_then(parse_http_date)
        .or_else(|| legacy_expires_segment(set_cookie).and_then(parse_legacy_date))
}

/// The value of the `Expires` attribute, matched case-insensitively
fn expires_attribute(set_cookie: &str) -> Option<&str> {
    set_cookie.split(';').skip(1).find_map(|attribute| {
        let (name, value) = attribute.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("expires")
            .then_some(value.trim())
    })
}

/// The text following a literal `Expires=` up to the next `;`
fn legacy_expires_segment(set_cookie: &str) -> Option<&str> {
    let start = set_cookie.find("Expires=")? + "Expires=".len();
    let rest = &set_cookie[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_legacy_date(value: &str) -> Option<DateTime<Utc>> {
    let (stamp, zone) = value.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(stamp, LEGACY_COOKIE_DATE).ok()?;
    let local = naive.and_local_timezone(offset).single()?;
    Some(local.with_timezone(&Utc))
}

/// Offset for a zone name or a numeric `+hhmm` offset
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    match zone {
        "GMT" | "UTC" | "UT" | "Z" => FixedOffset::east_opt(0),
        numeric => {
            let (sign, digits) = if let Some(digits) = numeric.strip_prefix('+') {
                (1, digits)
            } else if let Some(digits) = numeric.strip_prefix('-') {
                (-1, digits)
            } else {
                return None;
            };
            if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let hours: i32 = digits[..2].parse().ok()?;
            let minutes: i32 = digits[2..].parse().ok()?;
            FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        }
    }
}
