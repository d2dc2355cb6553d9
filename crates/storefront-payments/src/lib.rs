//! # storefront-payments: Payment Gateway Adapter
//!
//! Creates and captures remote payment orders for the storefront.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Payment Flow                                    │
//! │                                                                         │
//! │  Order (unpaid)                                                        │
//! │      │                                                                  │
//! │      │  1. create_remote_order(total_price)                            │
//! │      ▼                                                                  │
//! │  RemoteOrder { id: "5O190127TN364715T", status: "CREATED" }            │
//! │      │                                                                  │
//! │      │  stored on the order as a provisional PaymentResult             │
//! │      ▼                                                                  │
//! │  Buyer approves with the provider (outside this system)                │
//! │      │                                                                  │
//! │      │  2. capture_remote_order(remote_order_id)                       │
//! │      ▼                                                                  │
//! │  CapturedPayment { status: "COMPLETED", payer_email, amount }          │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  storefront-db marks the order paid in one transaction                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - The `PaymentGateway` trait and its mock
//! - [`paypal`] - PayPal REST implementation with token caching
//! - [`retry`] - Per-call timeout and exponential backoff
//! - [`config`] - `payments.toml` loading and env overrides
//! - [`error`] - Gateway error types

pub mod config;
pub mod error;
pub mod gateway;
pub mod paypal;
pub mod retry;

pub use config::{HttpSettings, PayPalSettings, PaymentsConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{CapturedPayment, MockPaymentGateway, PaymentGateway, RemoteOrder};
pub use paypal::PayPalClient;
pub use retry::RetryPolicy;
