//! Per-request session context and the authorization gate.
//!
//! The authenticated identity lives in an HS256-signed `session` cookie; flash messages
//! travel in a signed `flash` cookie until the next page render consumes them. Nothing
//! is kept in process memory: each request decodes its own [`Session`] and handlers
//! hand it back when building the response, which writes any cookie changes.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use cookie::time::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::convert::Infallible;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    models::{Identity, Role},
    repository::RepositoryState,
};

pub const SESSION_COOKIE: &str = "session";
pub const FLASH_COOKIE: &str = "flash";

const FLASH_TTL_SECS: i64 = 300;

pub const AGENTS_ONLY: &str = "Access restricted to agents";
pub const CLIENTS_ONLY: &str = "Access restricted to clients";
pub const GENERIC_FAILURE: &str = "Error processing the request";

// --- Flash messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum FlashLevel {
    Success,
    Error,
}

/// A one-shot, user-visible message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Page
///
/// What a template would have received: the consumed flash messages plus the view data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub flashes: Vec<Flash>,
    pub data: T,
}

// --- Signed cookie payloads ---

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    uid: i32,
    username: String,
    role_id: i32,
    role_name: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FlashClaims {
    flashes: Vec<Flash>,
    exp: i64,
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Option<String> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| tracing::error!(error = %e, "failed to sign cookie payload"))
        .ok()
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    // Tampered, expired and foreign tokens all read as "no cookie".
    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .ok()
}

/// Signed value of cookie `name`, with any surrounding quotes dropped.
fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|cookie| cookie.value_trimmed().to_owned())
}

fn session_cookie(name: &'static str, value: String, max_age: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(max_age))
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

// --- Session context ---

/// Session
///
/// Explicit per-request session context, extracted from the request cookies and threaded
/// through the handler. Changes (sign-in, sign-out, new flashes) are only written when the
/// handler turns the session into a response via [`Session::redirect`],
/// [`Session::render`] or [`Session::respond`].
#[derive(Clone)]
pub struct Session {
    jar: CookieJar,
    identity: Option<Identity>,
    incoming: Vec<Flash>,
    pending: Vec<Flash>,
    signed_in: Option<Identity>,
    signed_out: bool,
    secret: String,
    ttl_secs: i64,
    secure: bool,
}

impl Session {
    /// Decodes the session from request headers. Missing or invalid cookies yield an
    /// anonymous session with no flashes.
    pub fn from_headers(headers: &HeaderMap, config: &AppConfig) -> Self {
        let secret = &config.session_secret;
        let jar = CookieJar::from_headers(headers);

        let identity = cookie_value(&jar, SESSION_COOKIE)
            .and_then(|token| verify::<SessionClaims>(&token, secret))
            .map(|claims| Identity {
                user_id: claims.uid,
                username: claims.username,
                role_id: claims.role_id,
                role_name: claims.role_name,
            });

        let incoming = cookie_value(&jar, FLASH_COOKIE)
            .and_then(|token| verify::<FlashClaims>(&token, secret))
            .map(|claims| claims.flashes)
            .unwrap_or_default();

        Session {
            jar,
            identity,
            incoming,
            pending: Vec::new(),
            signed_in: None,
            signed_out: false,
            secret: secret.clone(),
            ttl_secs: config.session_ttl_hours * 3600,
            secure: config.is_production(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.pending.push(Flash {
            level,
            message: message.into(),
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.flash(FlashLevel::Success, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.flash(FlashLevel::Error, message);
    }

    /// Records `identity` as authenticated for subsequent requests.
    pub fn sign_in(&mut self, identity: Identity) {
        self.identity = Some(identity.clone());
        self.signed_in = Some(identity);
        self.signed_out = false;
    }

    /// Clears every piece of session state, including flashes not yet shown.
    pub fn sign_out(&mut self) {
        self.identity = None;
        self.signed_in = None;
        self.signed_out = true;
        self.incoming.clear();
        self.pending.clear();
    }

    /// 303 redirect. Flashes not yet shown are carried to the target page.
    pub fn redirect(self, path: &str) -> Response {
        self.respond(Redirect::to(path))
    }

    /// Renders the page payload, consuming every flash.
    pub fn render<T: Serialize>(mut self, data: T) -> Response {
        let mut flashes = std::mem::take(&mut self.incoming);
        flashes.append(&mut self.pending);
        self.respond(Json(Page { flashes, data }))
    }

    /// Attaches the session's cookie changes to an arbitrary response.
    pub fn respond(self, inner: impl IntoResponse) -> Response {
        let response = inner.into_response();
        let consumed = response.status() != StatusCode::SEE_OTHER;
        (self.into_jar(consumed), response).into_response()
    }

    /// The request's jar plus this session's changes. Removals are only emitted for
    /// cookies the request actually carried.
    fn into_jar(self, flashes_consumed: bool) -> CookieJar {
        let Session {
            mut jar,
            incoming,
            pending,
            signed_in,
            signed_out,
            secret,
            ttl_secs,
            secure,
            ..
        } = self;
        let now = Utc::now().timestamp();

        if let Some(identity) = signed_in {
            let claims = SessionClaims {
                uid: identity.user_id,
                username: identity.username,
                role_id: identity.role_id,
                role_name: identity.role_name,
                iat: now,
                exp: now + ttl_secs,
            };
            if let Some(token) = sign(&claims, &secret) {
                jar = jar.add(session_cookie(SESSION_COOKIE, token, ttl_secs, secure));
            }
        } else if signed_out {
            jar = jar.remove(removal(SESSION_COOKIE));
        }

        let mut carried = if flashes_consumed { Vec::new() } else { incoming };
        carried.extend(pending);

        if !carried.is_empty() {
            let claims = FlashClaims {
                flashes: carried,
                exp: now + FLASH_TTL_SECS,
            };
            if let Some(token) = sign(&claims, &secret) {
                jar = jar.add(session_cookie(FLASH_COOKIE, token, FLASH_TTL_SECS, secure));
            }
        } else if flashes_consumed || signed_out {
            jar = jar.remove(removal(FLASH_COOKIE));
        }

        jar
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(Session::from_headers(&parts.headers, &config))
    }
}

// --- Access predicates ---

pub fn is_authenticated(identity: Option<&Identity>) -> bool {
    identity.is_some()
}

pub fn is_agent(identity: Option<&Identity>) -> bool {
    identity.is_some_and(|id| id.role_id == Role::AGENT_ID)
}

pub fn is_client(identity: Option<&Identity>) -> bool {
    identity.is_some_and(|id| id.role_id == Role::CLIENT_ID)
}

/// Route category a handler requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    AgentOnly,
    ClientOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// No identity: send to the login page.
    Login,
    /// Identity present but the role does not fit; carries the notice to flash.
    WrongRole(&'static str),
}

impl Access {
    pub fn evaluate(self, identity: Option<&Identity>) -> AccessDecision {
        if !is_authenticated(identity) {
            return AccessDecision::Login;
        }
        match self {
            Access::Authenticated => AccessDecision::Allow,
            Access::AgentOnly if is_agent(identity) => AccessDecision::Allow,
            Access::AgentOnly => AccessDecision::WrongRole(AGENTS_ONLY),
            Access::ClientOnly if is_client(identity) => AccessDecision::Allow,
            Access::ClientOnly => AccessDecision::WrongRole(CLIENTS_ONLY),
        }
    }
}

// --- Gate extractors ---

/// Rejection produced by the gate extractors. Always a redirect; the request never
/// reaches the handler body.
pub struct GateRejection {
    session: Session,
    target: &'static str,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        self.session.redirect(self.target)
    }
}

async fn admit<S>(parts: &mut Parts, state: &S, access: Access) -> Result<Identity, GateRejection>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let config = AppConfig::from_ref(state);
    let mut session = Session::from_headers(&parts.headers, &config);

    // The cookie only names the user; the row is reloaded so a deleted user or a role
    // change takes effect on the next request.
    let identity = match session.identity().map(|id| id.user_id) {
        None => None,
        Some(user_id) => match RepositoryState::from_ref(state).get_user(user_id).await {
            Ok(Some(user)) => Some(Identity::from(user)),
            Ok(None) => {
                tracing::warn!(user_id, "session refers to a missing user");
                session.sign_out();
                None
            }
            Err(_) => {
                session.error(GENERIC_FAILURE);
                return Err(GateRejection {
                    session,
                    target: "/login",
                });
            }
        },
    };

    match access.evaluate(identity.as_ref()) {
        AccessDecision::Allow => identity.ok_or(GateRejection {
            session,
            target: "/login",
        }),
        AccessDecision::Login => {
            tracing::warn!(path = %parts.uri.path(), "access denied: not authenticated");
            Err(GateRejection {
                session,
                target: "/login",
            })
        }
        AccessDecision::WrongRole(notice) => {
            tracing::warn!(
                path = %parts.uri.path(),
                user_id = identity.as_ref().map(|id| id.user_id),
                role_id = identity.as_ref().map(|id| id.role_id),
                "access denied: wrong role"
            );
            session.error(notice);
            Err(GateRejection {
                session,
                target: "/dashboard",
            })
        }
    }
}

macro_rules! gate_extractor {
    ($(#[$meta:meta])* $name:ident, $access:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub Identity);

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
            RepositoryState: FromRef<S>,
            AppConfig: FromRef<S>,
        {
            type Rejection = GateRejection;

            async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
                admit(parts, state, $access).await.map($name)
            }
        }
    };
}

gate_extractor!(
    /// Any signed-in user.
    AuthenticatedUser,
    Access::Authenticated
);
gate_extractor!(
    /// Signed-in user with the agent role.
    AgentUser,
    Access::AgentOnly
);
gate_extractor!(
    /// Signed-in user with the client role.
    ClientUser,
    Access::ClientOnly
);
