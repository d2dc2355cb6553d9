//! # Payment Gateway Seam
//!
//! The trait the payment service calls. `PayPalClient` implements it for real
//! traffic; `MockPaymentGateway` is generated for callers' tests.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use storefront_core::Money;

/// A payment order created with the provider, awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    /// Provider-side order id, echoed back at capture time.
    pub id: String,
    /// Provider status, normally `CREATED`.
    pub status: String,
}

/// The outcome of capturing an approved remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPayment {
    pub remote_order_id: String,
    /// `COMPLETED` when funds settled; anything else is not a payment.
    pub status: String,
    pub payer_email: String,
    pub captured_amount: Money,
}

impl CapturedPayment {
    pub fn is_completed(&self) -> bool {
        self.status == storefront_core::CAPTURE_STATUS_COMPLETED
    }
}

/// Payment provider operations.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Obtains an access token, from cache when still valid.
    async fn authenticate(&self) -> GatewayResult<String>;

    /// Creates a capture-intent remote order for the amount.
    async fn create_remote_order(&self, amount: Money) -> GatewayResult<RemoteOrder>;

    /// Captures an approved remote order.
    async fn capture_remote_order(&self, remote_order_id: &str) -> GatewayResult<CapturedPayment>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[tokio::test]
    async fn test_mock_gateway_is_object_safe() {
        let mut mock = MockPaymentGateway::new();
        mock.expect_capture_remote_order()
            .withf(|id: &str| id == "REMOTE-1")
            .times(1)
            .returning(|id| {
                Ok(CapturedPayment {
                    remote_order_id: id.to_string(),
                    status: "COMPLETED".into(),
                    payer_email: "buyer@example.com".into(),
                    captured_amount: Money::from_cents(14375),
                })
            });
        mock.expect_create_remote_order()
            .returning(|_| Err(GatewayError::MissingCredentials));

        let gateway: Box<dyn PaymentGateway> = Box::new(mock);
        let captured = gateway.capture_remote_order("REMOTE-1").await.unwrap();
        assert!(captured.is_completed());
        assert!(gateway
            .create_remote_order(Money::from_cents(100))
            .await
            .is_err());
    }

    #[test]
    fn test_pending_capture_is_not_completed() {
        let captured = CapturedPayment {
            remote_order_id: "R".into(),
            status: "PENDING".into(),
            payer_email: String::new(),
            captured_amount: Money::zero(),
        };
        assert!(!captured.is_completed());
    }
}
