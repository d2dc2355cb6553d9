//! # Access Policy
//!
//! Session context and route authorization.
//!
//! Every lifecycle operation receives a [`SessionContext`] explicitly; nothing
//! looks the current session up on its own.
//!
//! ## Route Gate
//! ```text
//! request path ──► protected? ──no──► Allow
//!                      │
//!                     yes
//!                      │
//!                  signed in? ──no──► DenyToSignIn (/sign-in?callbackUrl=...)
//!                      │
//!                     yes
//!                      │
//!                  /admin/...? ──no──► Allow
//!                      │
//!                     yes
//!                      │
//!                   admin? ──no──► DenyUnauthorized (/unauthorized)
//!                      │
//!                     yes ──► Allow
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::{OwnerKey, Role};

/// Path prefixes that need a signed-in session.
pub const PROTECTED_ROUTES: &[&str] = &[
    "/shipping-address",
    "/payment-method",
    "/place-order",
    "/profile",
    "/user",
    "/order",
    "/admin",
];

/// Path prefix that additionally needs the admin role.
pub const ADMIN_ROUTE: &str = "/admin";

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

// =============================================================================
// Session
// =============================================================================

/// The signed-in identity carried by the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Everything a lifecycle operation knows about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Present once the caller has signed in.
    pub session: Option<Session>,
    /// Anonymous cart key from the session-cart cookie. Always present.
    pub session_cart_id: String,
}

impl SessionContext {
    pub fn guest(session_cart_id: impl Into<String>) -> Self {
        SessionContext {
            session: None,
            session_cart_id: session_cart_id.into(),
        }
    }

    pub fn signed_in(session: Session, session_cart_id: impl Into<String>) -> Self {
        SessionContext {
            session: Some(session),
            session_cart_id: session_cart_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.role == Role::Admin)
    }

    /// Key the caller's cart is stored under: the user id when signed in,
    /// the session-cart id otherwise.
    pub fn owner_key(&self) -> OwnerKey {
        match self.user_id() {
            Some(user_id) => OwnerKey::User(user_id.to_string()),
            None => OwnerKey::Session(self.session_cart_id.clone()),
        }
    }

    /// Returns the session or fails with `Unauthenticated`.
    pub fn require_user(&self) -> CoreResult<&Session> {
        self.session.as_ref().ok_or(CoreError::Unauthenticated)
    }

    /// Returns the session if it carries the admin role.
    pub fn require_admin(&self) -> CoreResult<&Session> {
        let session = self.require_user()?;
        if session.role != Role::Admin {
            return Err(CoreError::Forbidden {
                reason: "admin role required".to_string(),
            });
        }
        Ok(session)
    }
}

// =============================================================================
// Route Authorization
// =============================================================================

/// Outcome of [`authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Not signed in; send the browser to sign-in and back.
    DenyToSignIn { callback_url: String },
    /// Signed in but lacking the admin role.
    DenyUnauthorized,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }

    /// Where a denied request should be redirected.
    pub fn redirect_target(&self) -> Option<String> {
        match self {
            Access::Allow => None,
            Access::DenyToSignIn { callback_url } => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(callback_url.as_bytes()).collect();
                Some(format!("{}?callbackUrl={}", SIGN_IN_PATH, encoded))
            }
            Access::DenyUnauthorized => Some(UNAUTHORIZED_PATH.to_string()),
        }
    }
}

/// Matches `prefix` against whole path segments: `/order` covers `/order`
/// and `/order/123` but not `/orders`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

/// Whether `path` needs a signed-in session.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_ROUTES.iter().any(|p| matches_prefix(path, p))
}

/// Gates a page route.
///
/// ## Example
/// ```rust
/// use storefront_core::access::{authorize, Access};
///
/// assert_eq!(authorize("/cart", None), Access::Allow);
/// let denied = authorize("/place-order", None);
/// assert_eq!(
///     denied.redirect_target().as_deref(),
///     Some("/sign-in?callbackUrl=%2Fplace-order")
/// );
/// ```
pub fn authorize(path: &str, session: Option<&Session>) -> Access {
    if !is_protected(path) {
        return Access::Allow;
    }

    let Some(session) = session else {
        return Access::DenyToSignIn {
            callback_url: path.to_string(),
        };
    };

    if matches_prefix(path, ADMIN_ROUTE) && session.role != Role::Admin {
        return Access::DenyUnauthorized;
    }

    Access::Allow
}

/// Returns the existing session-cart id, or a fresh one.
///
/// The flag is `true` when a new id was generated and must be written back
/// as a cookie.
pub fn ensure_session_cart_id(existing: Option<&str>) -> (String, bool) {
    match existing.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => (id.to_string(), false),
        None => (Uuid::new_v4().to_string(), true),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
