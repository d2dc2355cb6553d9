//! # HTTP Routes
//!
//! Thin axum handlers over the lifecycle services. Every handler answers with
//! an [`ActionResult`] JSON body.
//!
//! ## Route Table
//! ```text
//! ┌──────────┬─────────────────────────────────────┬──────────────────────────┐
//! │ Method   │ Path                                │ Operation                │
//! ├──────────┼─────────────────────────────────────┼──────────────────────────┤
//! │ GET      │ /health                             │ health check             │
//! │ GET      │ /api/access?path=...                │ authorize                │
//! │ GET      │ /api/products/latest                │ latest_products          │
//! │ GET      │ /api/products/{slug}                │ product_by_slug          │
//! │ GET      │ /api/cart                           │ get_cart                 │
//! │ POST     │ /api/cart/items                     │ add_item                 │
//! │ DELETE   │ /api/cart/items/{product_id}        │ remove_item              │
//! │ POST     │ /api/auth/sign-up                   │ sign_up                  │
//! │ POST     │ /api/auth/sign-in                   │ sign_in                  │
//! │ POST     │ /api/auth/sign-out                  │ sign_out                 │
//! │ PUT      │ /api/user/address                   │ update_address           │
//! │ PUT      │ /api/user/payment-method            │ update_payment_method    │
//! │ PUT      │ /api/user/profile                   │ update_profile           │
//! │ POST     │ /api/orders                         │ create_order             │
//! │ GET      │ /api/orders                         │ my_orders                │
//! │ GET      │ /api/orders/{id}                    │ get_order                │
//! │ POST     │ /api/orders/{id}/paypal             │ initiate_payment         │
//! │ POST     │ /api/orders/{id}/paypal/capture     │ confirm_payment          │
//! │ POST     │ /api/admin/orders/{id}/paid         │ mark_paid_manually       │
//! │ POST     │ /api/admin/orders/{id}/delivered    │ mark_delivered           │
//! └──────────┴─────────────────────────────────────┴──────────────────────────┘
//! ```

mod account;
mod cart;
mod catalog;
mod orders;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use storefront_core::access::{authorize, Access};
use storefront_core::SessionContext;

use crate::error::{ActionResult, ApiResult, ErrorCode, Outcome};
use crate::session::session_middleware;
use crate::AppState;

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/access", get(access))
        .route("/api/products/latest", get(catalog::latest))
        .route("/api/products/{slug}", get(catalog::by_slug))
        .route("/api/cart", get(cart::get_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route("/api/cart/items/{product_id}", delete(cart::remove_item))
        .route("/api/auth/sign-up", post(account::sign_up))
        .route("/api/auth/sign-in", post(account::sign_in))
        .route("/api/auth/sign-out", post(account::sign_out))
        .route("/api/user/address", put(account::update_address))
        .route("/api/user/payment-method", put(account::update_payment_method))
        .route("/api/user/profile", put(account::update_profile))
        .route("/api/orders", post(orders::create_order).get(orders::my_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/paypal", post(orders::initiate_payment))
        .route("/api/orders/{id}/paypal/capture", post(orders::confirm_payment))
        .route("/api/admin/orders/{id}/paid", post(orders::mark_paid))
        .route("/api/admin/orders/{id}/delivered", post(orders::mark_delivered))
        .layer(from_fn_with_state(state.clone(), session_middleware))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wraps a read in a successful envelope.
pub(crate) fn found<T>(result: ApiResult<T>) -> ActionResult<T> {
    result.map(|data| Outcome::new("OK").with_data(data)).into()
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize)]
struct Health {
    database: bool,
    version: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> ActionResult<Health> {
    let database = state.db.health_check().await;
    let health = Health {
        database,
        version: env!("CARGO_PKG_VERSION"),
    };

    if database {
        Outcome::new("Healthy").with_data(health).into()
    } else {
        ActionResult {
            success: false,
            message: "Database unavailable".to_string(),
            redirect_to: None,
            code: Some(ErrorCode::DatabaseError),
            data: Some(health),
        }
    }
}

// =============================================================================
// Access
// =============================================================================

#[derive(Debug, Deserialize)]
struct AccessQuery {
    path: String,
}

#[derive(Debug, Serialize)]
struct AccessDecision {
    allowed: bool,
}

/// Gates a page route for the UI.
///
/// A denial is still a successful call; `redirectTo` says where to go.
async fn access(
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<AccessQuery>,
) -> Json<ActionResult<AccessDecision>> {
    let decision = authorize(&query.path, ctx.session.as_ref());

    let message = match &decision {
        Access::Allow => "Allowed",
        Access::DenyToSignIn { .. } => "Sign in required",
        Access::DenyUnauthorized => "Unauthorized",
    };
    if !decision.is_allowed() {
        warn!(path = %query.path, user_id = ?ctx.user_id(), "Route access denied");
    }

    let mut outcome = Outcome::new(message).with_data(AccessDecision {
        allowed: decision.is_allowed(),
    });
    outcome.redirect_to = decision.redirect_target();
    Json(outcome.into())
}

#[cfg(test)]
mod tests;
