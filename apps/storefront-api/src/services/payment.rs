//! Payment reconciliation service.
//!
//! ## Order State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Unpaid ──initiate_payment──► PaymentInitiated ──confirm_payment──┐    │
//! │     │                          (provisional result)                │    │
//! │     │                                                              ▼    │
//! │     └───────────── mark_paid_manually (admin) ──────────────────► Paid  │
//! │                                                                    │    │
//! │                                          mark_delivered (admin)    │    │
//! │                                                                    ▼    │
//! │                                                               Delivered │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reaching `Paid` decrements stock for every order line in the same
//! transaction that flips `is_paid`. The flip is a conditional update, so two
//! racing confirmations produce one transition and one `AlreadyPaid`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use storefront_core::{CoreError, Order, PaymentResult, SessionContext};
use storefront_db::OrderTransition;

use crate::error::{ApiError, ApiResult, Outcome};
use crate::services::OrderService;
use crate::AppState;

/// Payment service implementation.
pub struct PaymentService {
    state: Arc<AppState>,
}

impl PaymentService {
    /// Create a new payment service.
    pub fn new(state: Arc<AppState>) -> Self {
        PaymentService { state }
    }

    /// Creates a remote order for the order total and stores its id as a
    /// provisional payment result.
    ///
    /// Returns the remote order id the buyer approves with the provider.
    /// Initiating again replaces the previous provisional id.
    pub async fn initiate_payment(&self, ctx: &SessionContext, order_id: &str) -> ApiResult<Outcome<String>> {
        let order = self.visible_order(ctx, order_id).await?;

        if order.is_paid {
            return Err(CoreError::AlreadyPaid(order.id).into());
        }
        if !order.payment_method.uses_gateway() {
            return Err(ApiError::validation(format!(
                "Order is paid with {}, not through PayPal",
                order.payment_method
            )));
        }

        let remote = self
            .state
            .gateway
            .create_remote_order(order.prices.total_price)
            .await?;

        let transition = self
            .state
            .db
            .orders()
            .set_provisional_payment(&order.id, &PaymentResult::provisional(&remote.id))
            .await?;
        transition_result(transition, &order.id)?;

        info!(order_id = %order.id, remote_id = %remote.id, amount = %order.prices.total_price, "Payment initiated");

        Ok(Outcome::new("PayPal order created successfully").with_data(remote.id))
    }

    /// Captures an approved remote order and marks the order paid.
    ///
    /// ## Errors
    /// - `PaymentMismatch`: no payment initiated, the remote id differs from
    ///   the stored provisional id, or the capture is not `COMPLETED`
    /// - `AlreadyPaid`: the order was paid before or concurrently; nothing
    ///   changes
    pub async fn confirm_payment(
        &self,
        ctx: &SessionContext,
        order_id: &str,
        remote_order_id: &str,
    ) -> ApiResult<Outcome<Order>> {
        let order = self.visible_order(ctx, order_id).await?;

        if order.is_paid {
            return Err(CoreError::AlreadyPaid(order.id).into());
        }

        let Some(pending) = order.remote_order_id() else {
            return Err(mismatch("no payment was initiated for this order"));
        };
        if pending != remote_order_id {
            warn!(order_id = %order.id, pending = %pending, supplied = %remote_order_id, "Remote order id mismatch");
            return Err(mismatch("remote order id does not match the pending payment"));
        }

        let captured = self.state.gateway.capture_remote_order(remote_order_id).await?;

        if captured.remote_order_id != pending {
            warn!(order_id = %order.id, captured = %captured.remote_order_id, "Captured a different remote order");
            return Err(mismatch("captured payment belongs to another remote order"));
        }
        if !captured.is_completed() {
            warn!(order_id = %order.id, status = %captured.status, "Capture not completed");
            return Err(mismatch(&format!("capture status is {}", captured.status)));
        }

        let payment = PaymentResult::from(captured);
        let transition = self
            .state
            .db
            .orders()
            .mark_paid(&order.id, Some(&payment), Some(pending), Utc::now())
            .await?;
        transition_result(transition, &order.id)?;

        info!(order_id = %order.id, amount = %payment.amount_captured, payer = %payment.email_address, "Payment captured");

        let paid = self.reload(&order.id).await?;
        Ok(Outcome::new("Your order has been paid")
            .redirect(format!("/order/{}", order.id))
            .with_data(paid))
    }

    /// Marks an order paid without captured data (admin, e.g. cash on
    /// delivery).
    pub async fn mark_paid_manually(&self, ctx: &SessionContext, order_id: &str) -> ApiResult<Outcome<Order>> {
        let admin = ctx.require_admin()?;

        let transition = self
            .state
            .db
            .orders()
            .mark_paid(order_id, None, None, Utc::now())
            .await?;
        transition_result(transition, order_id)?;

        info!(order_id = %order_id, admin = %admin.user_id, "Order marked paid manually");

        let order = self.reload(order_id).await?;
        Ok(Outcome::new("Order marked as paid").with_data(order))
    }

    /// Marks a paid order delivered (admin).
    pub async fn mark_delivered(&self, ctx: &SessionContext, order_id: &str) -> ApiResult<Outcome<Order>> {
        let admin = ctx.require_admin()?;

        let transition = self
            .state
            .db
            .orders()
            .mark_delivered(order_id, Utc::now())
            .await?;
        transition_result(transition, order_id)?;

        info!(order_id = %order_id, admin = %admin.user_id, "Order marked delivered");

        let order = self.reload(order_id).await?;
        Ok(Outcome::new("Order marked as delivered").with_data(order))
    }

    async fn visible_order(&self, ctx: &SessionContext, order_id: &str) -> ApiResult<Order> {
        OrderService::new(self.state.clone()).get_order(ctx, order_id).await
    }

    async fn reload(&self, order_id: &str) -> ApiResult<Order> {
        self.state
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

fn mismatch(reason: &str) -> ApiError {
    CoreError::PaymentMismatch {
        reason: reason.to_string(),
    }
    .into()
}

/// Maps a guarded order update to the error taxonomy.
fn transition_result(transition: OrderTransition, order_id: &str) -> ApiResult<()> {
    let id = order_id.to_string();
    let err = match transition {
        OrderTransition::Applied => return Ok(()),
        OrderTransition::NotFound => CoreError::OrderNotFound(id),
        OrderTransition::AlreadyPaid => CoreError::AlreadyPaid(id),
        OrderTransition::NotPaid => CoreError::NotPaid(id),
        OrderTransition::AlreadyDelivered => CoreError::AlreadyDelivered(id),
        OrderTransition::RemoteIdMismatch => CoreError::PaymentMismatch {
            reason: "remote order id does not match the pending payment".to_string(),
        },
    };
    Err(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::CartService;
    use crate::test_support::{checkout_ready_user, product, signed_in, state_with};
    use storefront_core::{Money, OrderStatus, PaymentMethod, Role, User};
    use storefront_payments::{CapturedPayment, GatewayError, MockPaymentGateway, RemoteOrder};

    const REMOTE_ID: &str = "5O190127TN364715T";

    fn gateway(capture_status: &'static str) -> MockPaymentGateway {
        let mut mock = MockPaymentGateway::new();
        mock.expect_create_remote_order().returning(|_| {
            Ok(RemoteOrder {
                id: REMOTE_ID.to_string(),
                status: "CREATED".to_string(),
            })
        });
        mock.expect_capture_remote_order().returning(move |id: &str| {
            Ok(CapturedPayment {
                remote_order_id: id.to_string(),
                status: capture_status.to_string(),
                payer_email: "buyer@example.com".to_string(),
                captured_amount: Money::from_cents(14_375),
            })
        });
        mock
    }

    /// Places an order for 5 × 25.00 of a product with `stock` units.
    async fn placed_order(
        gateway: MockPaymentGateway,
        stock: i64,
    ) -> (Arc<AppState>, SessionContext, String) {
        let state = state_with(gateway).await;
        state.db.products().insert(&product("p1", 2500, stock)).await.unwrap();
        let ctx = checkout_ready_user(&state, "jane@example.com").await;

        let carts = CartService::new(state.clone());
        for _ in 0..5 {
            carts.add_item(&ctx, "p1").await.unwrap();
        }
        let order_id = OrderService::new(state.clone())
            .create_order(&ctx)
            .await
            .unwrap()
            .data
            .unwrap();
        (state, ctx, order_id)
    }

    async fn admin(state: &AppState) -> SessionContext {
        let mut user = User::new("Admin", "admin@example.com", "hash".into());
        user.role = Role::Admin;
        state.db.users().insert(&user).await.unwrap();
        signed_in(&user, "admin-session")
    }

    async fn stock(state: &AppState) -> i64 {
        state.db.products().get_by_id("p1").await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_full_paypal_flow() {
        let (state, ctx, order_id) = placed_order(gateway("COMPLETED"), 10).await;
        let service = PaymentService::new(state.clone());

        let outcome = service.initiate_payment(&ctx, &order_id).await.unwrap();
        assert_eq!(outcome.data.as_deref(), Some(REMOTE_ID));

        let order = state.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::PaymentInitiated);
        assert_eq!(order.payment_result, Some(PaymentResult::provisional(REMOTE_ID)));

        let outcome = service.confirm_payment(&ctx, &order_id, REMOTE_ID).await.unwrap();
        let paid = outcome.data.unwrap();
        assert!(paid.is_paid);
        assert!(paid.paid_at.is_some());
        let result = paid.payment_result.unwrap();
        assert!(result.is_completed());
        assert_eq!(result.email_address, "buyer@example.com");
        assert_eq!(stock(&state).await, 5);
    }

    #[tokio::test]
    async fn test_second_confirmation_reports_already_paid() {
        let (state, ctx, order_id) = placed_order(gateway("COMPLETED"), 10).await;
        let service = PaymentService::new(state.clone());

        service.initiate_payment(&ctx, &order_id).await.unwrap();
        service.confirm_payment(&ctx, &order_id, REMOTE_ID).await.unwrap();

        let err = service.confirm_payment(&ctx, &order_id, REMOTE_ID).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyPaid);
        assert_eq!(stock(&state).await, 5);

        let err = service.initiate_payment(&ctx, &order_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyPaid);
    }

    #[tokio::test]
    async fn test_incomplete_capture_is_mismatch() {
        let (state, ctx, order_id) = placed_order(gateway("PENDING"), 10).await;
        let service = PaymentService::new(state.clone());

        service.initiate_payment(&ctx, &order_id).await.unwrap();
        let err = service.confirm_payment(&ctx, &order_id, REMOTE_ID).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentMismatch);

        let order = state.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert!(!order.is_paid);
        assert_eq!(stock(&state).await, 10);
    }

    #[tokio::test]
    async fn test_foreign_remote_id_never_captured() {
        let mut mock = MockPaymentGateway::new();
        mock.expect_create_remote_order().returning(|_| {
            Ok(RemoteOrder {
                id: REMOTE_ID.to_string(),
                status: "CREATED".to_string(),
            })
        });
        mock.expect_capture_remote_order().never();

        let (state, ctx, order_id) = placed_order(mock, 10).await;
        let service = PaymentService::new(state);

        let err = service.confirm_payment(&ctx, &order_id, REMOTE_ID).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentMismatch);

        service.initiate_payment(&ctx, &order_id).await.unwrap();
        let err = service.confirm_payment(&ctx, &order_id, "OTHER-ID").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentMismatch);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_order_unpaid() {
        let mut mock = MockPaymentGateway::new();
        mock.expect_create_remote_order()
            .returning(|_| Err(GatewayError::Timeout(15)));

        let (state, ctx, order_id) = placed_order(mock, 10).await;
        let err = PaymentService::new(state.clone())
            .initiate_payment(&ctx, &order_id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentError);

        let order = state.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_admin_transitions() {
        let (state, ctx, order_id) = placed_order(MockPaymentGateway::new(), 10).await;
        let service = PaymentService::new(state.clone());
        let admin = admin(&state).await;

        let err = service.mark_paid_manually(&ctx, &order_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let err = service.mark_delivered(&admin, &order_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotPaid);

        let paid = service.mark_paid_manually(&admin, &order_id).await.unwrap().data.unwrap();
        assert!(paid.is_paid);
        assert!(paid.payment_result.is_none());
        assert_eq!(stock(&state).await, 5);

        let delivered = service.mark_delivered(&admin, &order_id).await.unwrap().data.unwrap();
        assert_eq!(delivered.status(), OrderStatus::Delivered);

        let err = service.mark_delivered(&admin, &order_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyDelivered);

        let err = service.mark_paid_manually(&admin, "missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_non_gateway_method_cannot_initiate() {
        let state = state_with(MockPaymentGateway::new()).await;
        state.db.products().insert(&product("p1", 2500, 10)).await.unwrap();

        let mut user = User::new("Jane Doe", "jane@example.com", "hash".into());
        user.address = Some(crate::test_support::address());
        user.payment_method = Some(PaymentMethod::CashOnDelivery);
        state.db.users().insert(&user).await.unwrap();
        let ctx = signed_in(&user, "s1");

        CartService::new(state.clone()).add_item(&ctx, "p1").await.unwrap();
        let order_id = OrderService::new(state.clone())
            .create_order(&ctx)
            .await
            .unwrap()
            .data
            .unwrap();

        let err = PaymentService::new(state).initiate_payment(&ctx, &order_id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
