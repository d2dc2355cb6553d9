//! # storefront-core: Pure Lifecycle Logic for the Storefront
//!
//! This crate holds the cart, pricing, order and access rules of the
//! storefront as pure functions and plain data. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Storefront UI (external)                     │   │
//! │  │    Product page ──► Cart ──► Shipping ──► Payment ──► Order     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    storefront-api (services)                    │   │
//! │  │    add_item, create_order, confirm_payment, mark_delivered     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │  access   │  │ validation│  │   │
//! │  │   │   Cart    │  │  round2   │  │ authorize │  │  schemas  │  │   │
//! │  │   │   Order   │  │ shipping  │  │  Session  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            storefront-db / storefront-payments                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Cart, Order, User, etc.)
//! - [`money`] - Money type with integer arithmetic and `round2`
//! - [`pricing`] - The pricing engine (items, shipping, tax, total)
//! - [`access`] - Session context and route authorization
//! - [`error`] - Domain error types
//! - [`validation`] - Input schema validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::pricing::{compute_prices, PricingPolicy};
//! use storefront_core::types::CartItem;
//!
//! let item = CartItem {
//!     product_id: "p-1".to_string(),
//!     name: "Polo Shirt".to_string(),
//!     slug: "polo-shirt".to_string(),
//!     image: "/images/polo.jpg".to_string(),
//!     price: "25.00".parse::<Money>().unwrap(),
//!     qty: 5,
//! };
//!
//! let prices = compute_prices(&[item], &PricingPolicy::default());
//! assert_eq!(prices.items_price.to_decimal_string(), "125.00");
//! assert_eq!(prices.shipping_price.to_decimal_string(), "0.00");
//! assert_eq!(prices.tax_price.to_decimal_string(), "18.75");
//! assert_eq!(prices.total_price.to_decimal_string(), "143.75");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{Access, Session, SessionContext};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{compute_prices, PriceBreakdown, PricingPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default sales tax rate in basis points (0.15).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1500;

/// Orders with an items price strictly above this ship free (100.00).
pub const FREE_SHIPPING_THRESHOLD_CENTS: i64 = 10_000;

/// Flat shipping fee charged below the threshold (10.00).
pub const FLAT_SHIPPING_CENTS: i64 = 1_000;

/// Maximum quantity of a single line in a cart.
///
/// ## Business Reason
/// Cart quantity grows one unit per add, so this only guards against
/// malformed input reaching the schema check.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Lifetime of a signed-in session and of the session-cart cookie.
pub const SESSION_MAX_AGE_DAYS: i64 = 30;

/// Capture status the payment provider reports for settled funds.
pub const CAPTURE_STATUS_COMPLETED: &str = "COMPLETED";
