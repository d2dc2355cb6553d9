//! # Pricing Engine
//!
//! Computes the four prices every cart and order carries.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items ──► items_price = Σ price × qty                                  │
//! │                 │                                                       │
//! │                 ├──► shipping_price = 0      if items_price > 100.00    │
//! │                 │                     10.00  otherwise                  │
//! │                 │                                                       │
//! │                 ├──► tax_price = items_price × 15% (half away from 0)   │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  total_price = items_price + shipping_price + tax_price                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An empty item list still owes the flat shipping fee. Only clearing a cart
//! at checkout zeroes its prices (see `Cart::clear`).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CartItem, TaxRate};
use crate::{FLAT_SHIPPING_CENTS, FREE_SHIPPING_THRESHOLD_CENTS};

/// Shop-wide pricing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_rate: TaxRate,
    /// Items price must be strictly above this for free shipping.
    pub free_shipping_over: Money,
    pub flat_shipping: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            tax_rate: TaxRate::default(),
            free_shipping_over: Money::from_cents(FREE_SHIPPING_THRESHOLD_CENTS),
            flat_shipping: Money::from_cents(FLAT_SHIPPING_CENTS),
        }
    }
}

impl PricingPolicy {
    /// Shipping owed for a given items price.
    pub fn shipping_for(&self, items_price: Money) -> Money {
        if items_price > self.free_shipping_over {
            Money::zero()
        } else {
            self.flat_shipping
        }
    }
}

/// The four derived prices of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[ts(type = "string")]
    pub items_price: Money,
    #[ts(type = "string")]
    pub shipping_price: Money,
    #[ts(type = "string")]
    pub tax_price: Money,
    #[ts(type = "string")]
    pub total_price: Money,
}

impl PriceBreakdown {
    #[inline]
    pub const fn zero() -> Self {
        PriceBreakdown {
            items_price: Money::zero(),
            shipping_price: Money::zero(),
            tax_price: Money::zero(),
            total_price: Money::zero(),
        }
    }
}

/// Prices a list of cart lines.
///
/// ## Example
/// ```rust
/// use storefront_core::money::Money;
/// use storefront_core::pricing::{compute_prices, PricingPolicy};
/// use storefront_core::types::CartItem;
///
/// let item = CartItem {
///     product_id: "p-1".into(),
///     name: "Mug".into(),
///     slug: "mug".into(),
///     image: "/images/mug.jpg".into(),
///     price: Money::from_cents(1000),
///     qty: 1,
/// };
/// let prices = compute_prices(&[item], &PricingPolicy::default());
/// assert_eq!(prices.shipping_price.to_decimal_string(), "10.00");
/// assert_eq!(prices.tax_price.to_decimal_string(), "1.50");
/// assert_eq!(prices.total_price.to_decimal_string(), "21.50");
/// ```
pub fn compute_prices(items: &[CartItem], policy: &PricingPolicy) -> PriceBreakdown {
    let items_price: Money = items.iter().map(CartItem::line_total).sum();
    let shipping_price = policy.shipping_for(items_price);
    let tax_price = items_price.calculate_tax(policy.tax_rate);

    PriceBreakdown {
        items_price,
        shipping_price,
        tax_price,
        total_price: items_price + shipping_price + tax_price,
    }
}
