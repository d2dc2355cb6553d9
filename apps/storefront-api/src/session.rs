//! # Session Middleware
//!
//! Builds the [`SessionContext`] every handler receives.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                               │
//! │     │                                                                   │
//! │     ├── Cookie: sessionCartId=...  ──► reuse, or mint a new id         │
//! │     │                                                                   │
//! │     ├── Authorization: Bearer ...  ─┐                                   │
//! │     └── Cookie: session=...  ───────┴─► validate token ──► Session      │
//! │                                         (invalid/expired = guest)      │
//! │                                                                         │
//! │  Extension<SessionContext> ──► handler                                 │
//! │                                                                         │
//! │  Response                                                              │
//! │     └── Set-Cookie: sessionCartId=... (only when newly minted)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session-cart id is assigned before any handler runs, so the cart store
//! is never consulted without one.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use storefront_core::access::ensure_session_cart_id;
use storefront_core::SessionContext;

use crate::auth::extract_bearer_token;
use crate::AppState;

/// Cookie holding the anonymous cart key.
pub const SESSION_CART_COOKIE: &str = "sessionCartId";

/// Cookie holding the signed session token.
pub const SESSION_COOKIE: &str = "session";

/// Resolves the caller's session and session-cart id.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let headers = req.headers();

    let (session_cart_id, minted) =
        ensure_session_cart_id(cookie_value(headers, SESSION_CART_COOKIE).as_deref());

    let session = session_token(headers).and_then(|token| {
        state
            .sessions
            .validate(&token)
            .map_err(|e| debug!(error = %e.message, "Ignoring invalid session token"))
            .ok()
    });

    let ctx = match session {
        Some(session) => SessionContext::signed_in(session, session_cart_id.clone()),
        None => SessionContext::guest(session_cart_id.clone()),
    };
    req.extensions_mut().insert(ctx);

    let mut resp = next.run(req).await;

    if minted {
        debug!(session_cart_id = %session_cart_id, "Assigned session cart id");
        let cookie = build_cookie(
            SESSION_CART_COOKIE,
            &session_cart_id,
            state.config.session_max_age_secs(),
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            resp.headers_mut().append(SET_COOKIE, value);
        }
    }
    resp
}

/// Bearer header wins over the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
        .or_else(|| cookie_value(headers, SESSION_COOKIE))
}

/// Reads a cookie from all `Cookie` headers of the request.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for an HTTP-only cookie scoped to the whole site.
pub fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        name, value, max_age_secs
    )
}

/// `Set-Cookie` value that deletes a cookie.
pub fn expired_cookie(name: &str) -> String {
    build_cookie(name, "", 0)
}

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    build_cookie(SESSION_COOKIE, token, max_age_secs)
}
