//! Order service implementation.
//!
//! ## Checkout Preconditions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(ctx)                                                     │
//! │     │                                                                   │
//! │     ├── cart missing or empty ──────► "Your cart is empty"   → /cart   │
//! │     ├── no saved address ───────────► "Please add a shipping address"  │
//! │     │                                                 → /shipping-address
//! │     ├── no payment method ──────────► "Please select a payment method" │
//! │     │                                                 → /payment-method│
//! │     ▼                                                                   │
//! │  one transaction: order + order items + empty cart     → /order/{id}   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use storefront_core::validation::validate_uuid;
use storefront_core::{CoreError, Order, OwnerKey, SessionContext};
use storefront_db::DbError;

use crate::error::{ApiError, ApiResult, ErrorCode, Outcome};
use crate::AppState;

/// Default page size of the order history.
pub const DEFAULT_ORDER_HISTORY_LIMIT: u32 = 20;

/// Order service implementation.
pub struct OrderService {
    state: Arc<AppState>,
}

impl OrderService {
    /// Create a new order service.
    pub fn new(state: Arc<AppState>) -> Self {
        OrderService { state }
    }

    /// Freezes the signed-in user's cart into a new unpaid order.
    ///
    /// Returns the new order id; the redirect points at the order page.
    pub async fn create_order(&self, ctx: &SessionContext) -> ApiResult<Outcome<String>> {
        let session = ctx.require_user()?;

        let cart = self
            .state
            .db
            .carts()
            .find_by_owner(&OwnerKey::User(session.user_id.clone()))
            .await?;

        let cart = match cart {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(ApiError::validation("Your cart is empty").redirect("/cart")),
        };

        let user = self
            .state
            .db
            .users()
            .get_by_id(&session.user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(session.user_id.clone()))?;

        let Some(address) = user.address else {
            return Err(ApiError::validation("Please add a shipping address").redirect("/shipping-address"));
        };

        let Some(payment_method) = user.payment_method else {
            return Err(ApiError::validation("Please select a payment method").redirect("/payment-method"));
        };

        let order = Order::from_cart(&cart, &user.id, address, payment_method);

        match self
            .state
            .db
            .orders()
            .create_from_cart(&order, &cart.id, cart.version)
            .await
        {
            Ok(()) => {}
            Err(DbError::StaleWrite { .. }) => {
                warn!(cart_id = %cart.id, "Cart changed during checkout");
                return Err(ApiError::new(
                    ErrorCode::ValidationError,
                    "Your cart changed, please review it before placing the order",
                )
                .redirect("/cart"));
            }
            Err(e) => return Err(e.into()),
        }

        info!(order_id = %order.id, user_id = %user.id, total = %order.prices.total_price, "Checkout complete");

        Ok(Outcome::new("Order successfully created")
            .redirect(format!("/order/{}", order.id))
            .with_data(order.id))
    }

    /// An order visible to the caller: its owner or an admin.
    ///
    /// Orders of other users are reported as not found.
    pub async fn get_order(&self, ctx: &SessionContext, order_id: &str) -> ApiResult<Order> {
        let session = ctx.require_user()?;

        let not_found = || ApiError::from(CoreError::OrderNotFound(order_id.to_string()));

        if validate_uuid(order_id).is_err() {
            return Err(not_found());
        }

        let order = self
            .state
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(not_found)?;

        if order.user_id != session.user_id && !ctx.is_admin() {
            warn!(order_id = %order_id, user_id = %session.user_id, "Order requested by non-owner");
            return Err(not_found());
        }

        Ok(order)
    }

    /// The signed-in user's orders, newest first.
    pub async fn my_orders(&self, ctx: &SessionContext, limit: Option<u32>) -> ApiResult<Vec<Order>> {
        let session = ctx.require_user()?;
        let limit = limit.unwrap_or(DEFAULT_ORDER_HISTORY_LIMIT).clamp(1, 100);

        Ok(self
            .state
            .db
            .orders()
            .list_for_user(&session.user_id, limit)
            .await?)
    }
}
