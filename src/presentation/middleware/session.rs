//! Session Middleware
//!
//! Cookie-backed sessions signed with rotating keys.
//!
//! The cookie value is the base64 of `{ "data": {..}, "iat": <unix secs> }`,
//! signed by [`SignedCookieJar`]. The first key signs; every key verifies,
//! and a cookie verified by an older key is re-issued under the first.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, Key, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use config::ConfigError;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{SessionSettings, MIN_SESSION_SECRET_LENGTH};

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

/// Signing keys and cookie attributes
#[derive(Clone)]
pub struct SessionConfig {
    keys: Arc<Vec<Key>>,
    max_age: Duration,
    secure: bool,
}

impl SessionConfig {
    /// Derive the signing keys from the configured secrets, newest first.
    pub fn new(settings: &SessionSettings, secure: bool) -> Result<Self, ConfigError> {
        let secrets = [&settings.secret_key_one, &settings.secret_key_two];
        if secrets.iter().any(|s| s.len() < MIN_SESSION_SECRET_LENGTH) {
            return Err(ConfigError::Message(format!(
                "session secrets must be at least {} characters",
                MIN_SESSION_SECRET_LENGTH
            )));
        }

        Ok(Self {
            keys: Arc::new(secrets.iter().map(|s| Key::derive_from(s.as_bytes())).collect()),
            max_age: Duration::from_secs(settings.max_age_secs),
            secure,
        })
    }

    fn primary(&self) -> Key {
        self.keys[0].clone()
    }

    /// Verify the incoming cookie against every key in order
    fn load(&self, headers: &HeaderMap) -> Incoming {
        for (index, key) in self.keys.iter().enumerate() {
            let jar = SignedCookieJar::from_headers(headers, key.clone());
            let Some(cookie) = jar.get(SESSION_COOKIE) else {
                continue;
            };
            return match decode(cookie.value()) {
                Some(payload) if !self.is_expired(&payload) => Incoming::Valid {
                    payload,
                    rotated: index > 0,
                },
                _ => Incoming::Stale,
            };
        }

        if headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.split(';').any(|c| c.trim().starts_with("session=")))
        {
            Incoming::Stale
        } else {
            Incoming::Absent
        }
    }

    fn is_expired(&self, payload: &SessionPayload) -> bool {
        let age = Utc::now().timestamp().saturating_sub(payload.iat);
        age < 0 || age as u64 > self.max_age.as_secs()
    }

    /// Cookie to send back, if any
    fn outgoing(&self, session: &Session, incoming: Incoming) -> Option<Outgoing> {
        let (data, changed) = session.snapshot();

        if changed {
            if data.is_empty() {
                return match incoming {
                    Incoming::Absent => None,
                    _ => Some(Outgoing::Clear),
                };
            }
            let payload = SessionPayload {
                data,
                iat: Utc::now().timestamp(),
            };
            return Some(Outgoing::Set(self.cookie(encode(&payload)?)));
        }

        match incoming {
            Incoming::Valid {
                payload,
                rotated: true,
            } => {
                tracing::debug!("Re-signing session cookie with the current key");
                Some(Outgoing::Set(self.cookie(encode(&payload)?)))
            }
            Incoming::Stale => Some(Outgoing::Clear),
            _ => None,
        }
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::parse(format!(
            "{}={}; Max-Age={}",
            SESSION_COOKIE,
            value,
            self.max_age.as_secs()
        ))
        .unwrap_or_else(move |_| Cookie::new(SESSION_COOKIE, value));
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        cookie
    }

    /// Expired, empty `session` cookie on the same path.
    ///
    /// Sent unsigned: the jar only tracks cookies that verified, and a
    /// stale or tampered one must be cleared as well.
    fn removal(&self) -> Cookie<'static> {
        let mut cookie = Cookie::from(SESSION_COOKIE);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        cookie.make_removal();
        cookie
    }

    fn apply(&self, outgoing: Outgoing, response: Response) -> Response {
        match outgoing {
            Outgoing::Set(cookie) => {
                (SignedCookieJar::new(self.primary()).add(cookie), response).into_response()
            }
            Outgoing::Clear => (CookieJar::new().add(self.removal()), response).into_response(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionPayload {
    #[serde(default)]
    data: Map<String, Value>,
    iat: i64,
}

enum Outgoing {
    Set(Cookie<'static>),
    Clear,
}

enum Incoming {
    Absent,
    Valid { payload: SessionPayload, rotated: bool },
    Stale,
}

fn encode(payload: &SessionPayload) -> Option<String> {
    serde_json::to_vec(payload)
        .ok()
        .map(|json| URL_SAFE_NO_PAD.encode(json))
}

fn decode(value: &str) -> Option<SessionPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[derive(Debug, Default)]
struct SessionInner {
    data: Map<String, Value>,
    changed: bool,
}

/// Per-request session handle. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn from_data(data: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                data,
                changed: false,
            })),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.inner.lock();
        inner
            .data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock();
        inner.data.insert(key.to_owned(), value);
        inner.changed = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.changed = true;
        }
        removed
    }

    /// Drop all data; the cookie is cleared on the response
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.data.clear();
        inner.changed = true;
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().data.is_empty()
    }

    fn snapshot(&self) -> (Map<String, Value>, bool) {
        let inner = self.inner.lock();
        (inner.data.clone(), inner.changed)
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().unwrap_or_default())
    }
}

/// Load the session before the request and write the cookie after it.
pub async fn session_middleware(
    State(config): State<SessionConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let incoming = config.load(request.headers());
    let session = match &incoming {
        Incoming::Valid { payload, .. } => Session::from_data(payload.data.clone()),
        _ => Session::default(),
    };
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    match config.outgoing(&session, incoming) {
        Some(outgoing) => config.apply(outgoing, response),
        None => response,
    }
}
