//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Cart       │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, slug       │   │  id, version    │   │  id, user_id    │       │
//! │  │  price, stock   │──►│  items[]        │──►│  items[]        │       │
//! │  │  (catalog)      │   │  prices         │   │  prices (frozen)│       │
//! │  └─────────────────┘   │  owner: session │   │  is_paid        │       │
//! │                        │      or user    │   │  is_delivered   │       │
//! │                        └─────────────────┘   │  payment_result │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │ PaymentMethod   │   │  OrderStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  role           │   │  PayPal         │   │  Unpaid         │       │
//! │  │  address?       │   │  Stripe         │   │  PaymentInit.   │       │
//! │  │  payment_method?│   │  CashOnDelivery │   │  Paid           │       │
//! │  └─────────────────┘   └─────────────────┘   │  Delivered      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `CartItem` and `OrderItem` copy name, slug, image and price from the
//! product at the moment they are created. Later catalog edits never reach
//! an existing cart line or order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{compute_prices, PriceBreakdown, PricingPolicy};
use crate::{CAPTURE_STATUS_COMPLETED, MAX_ITEM_QUANTITY};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (the storefront default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a fraction (0.15 = 15%).
    pub fn from_fraction(fraction: f64) -> Self {
        TaxRate((fraction * 10_000.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction (for display only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Role
// =============================================================================

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinary customer.
    #[default]
    User,
    /// Can mark orders paid and delivered.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentMethod {
    /// Captured through the PayPal gateway.
    PayPal,
    /// Card payment (settled outside the gateway adapter).
    Stripe,
    /// Paid to the courier; an admin marks the order paid.
    CashOnDelivery,
}

impl PaymentMethod {
    /// All methods, in the order the UI offers them.
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::PayPal,
        PaymentMethod::Stripe,
        PaymentMethod::CashOnDelivery,
    ];

    /// Returns the wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::Stripe => "Stripe",
            PaymentMethod::CashOnDelivery => "CashOnDelivery",
        }
    }

    /// Whether payment is captured through the gateway adapter.
    pub const fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::PayPal)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "paymentMethod".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.to_string()).collect(),
            })
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Shipping address saved on the user and snapshotted onto orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

// =============================================================================
// User
// =============================================================================

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub address: Option<ShippingAddress>,
    pub payment_method: Option<PaymentMethod>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with the default role.
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        User {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            password_hash: Some(password_hash),
            role: Role::User,
            address: None,
            payment_method: None,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product. Owned by the catalog; the lifecycle only reads price
/// and stock, and decrements stock when an order is paid.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub brand: String,
    pub description: String,
    pub images: Vec<String>,
    #[ts(type = "string")]
    pub price: Money,
    /// Units on hand, never negative.
    pub stock: i64,
    pub rating: f64,
    pub num_reviews: i64,
    pub is_featured: bool,
    pub banner: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Checks whether `quantity` units are on hand.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }

    /// The image shown on cart and order lines.
    pub fn primary_image(&self) -> &str {
        self.images.first().map(String::as_str).unwrap_or_default()
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A line in a cart. The price is frozen when the line is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    #[ts(type = "string")]
    pub price: Money,
    pub qty: i64,
}

impl CartItem {
    /// Snapshots a product into a one-unit cart line.
    pub fn from_product(product: &Product) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            slug: product.slug.clone(),
            image: product.primary_image().to_string(),
            price: product.price,
            qty: 1,
        }
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.qty)
    }
}

// =============================================================================
// Cart Ownership
// =============================================================================

/// Key a cart is looked up by.
///
/// A guest cart is keyed by the session-cart cookie; once its owner signs in
/// it is keyed by the user id and the session id stops mattering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    Session(String),
    User(String),
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Session(id) => write!(f, "session:{}", id),
            OwnerKey::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// What a cart mutation did to the affected line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// New line appended.
    Added,
    /// Existing line quantity went up by one.
    Incremented,
    /// Existing line quantity went down by one.
    Decremented,
    /// Line removed entirely.
    Removed,
}

impl CartChange {
    /// User-facing message for a change to the named product.
    pub fn message(&self, name: &str) -> String {
        match self {
            CartChange::Added => format!("{} added to cart successfully", name),
            CartChange::Incremented | CartChange::Decremented => {
                format!("{} updated in cart successfully", name)
            }
            CartChange::Removed => format!("{} removed from cart successfully", name),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A shopping cart.
///
/// ## Invariant
/// `prices` is always `compute_prices(items)`. The only mutators are
/// [`Cart::add_product`], [`Cart::remove_product`] and [`Cart::clear`], and
/// each of them reprices before returning.
///
/// ## Version
/// Every stored write bumps `version`. Writers send the version they read and
/// the store rejects stale writes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    pub session_cart_id: String,
    pub user_id: Option<String>,
    pub items: Vec<CartItem>,
    #[serde(flatten)]
    #[ts(flatten)]
    pub prices: PriceBreakdown,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a session, optionally already owned by a user.
    pub fn new(session_cart_id: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Cart {
            id: Uuid::new_v4().to_string(),
            session_cart_id: session_cart_id.into(),
            user_id,
            items: Vec::new(),
            prices: PriceBreakdown::zero(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The key this cart is found by.
    pub fn owner(&self) -> OwnerKey {
        match &self.user_id {
            Some(user_id) => OwnerKey::User(user_id.clone()),
            None => OwnerKey::Session(self.session_cart_id.clone()),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_item(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Adds one unit of `product`.
    ///
    /// ## Behavior
    /// - Already in cart: qty + 1, provided `stock >= qty + 1`
    /// - Not in cart: appended with qty 1, provided `stock >= 1`
    ///
    /// On error the cart is left untouched.
    pub fn add_product(&mut self, product: &Product, policy: &PricingPolicy) -> CoreResult<CartChange> {
        let change = match self.items.iter_mut().find(|i| i.product_id == product.id) {
            Some(existing) => {
                let requested = existing.qty + 1;
                if requested > MAX_ITEM_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested,
                        max: MAX_ITEM_QUANTITY,
                    });
                }
                if !product.can_sell(requested) {
                    return Err(CoreError::InsufficientStock {
                        product: product.name.clone(),
                        available: product.stock,
                        requested,
                    });
                }
                existing.qty = requested;
                CartChange::Incremented
            }
            None => {
                if !product.can_sell(1) {
                    return Err(CoreError::InsufficientStock {
                        product: product.name.clone(),
                        available: product.stock,
                        requested: 1,
                    });
                }
                self.items.push(CartItem::from_product(product));
                CartChange::Added
            }
        };

        self.reprice(policy);
        Ok(change)
    }

    /// Removes one unit of the product, dropping the line at qty 1.
    ///
    /// Returns the change and the affected line as it was before removal.
    pub fn remove_product(
        &mut self,
        product_id: &str,
        policy: &PricingPolicy,
    ) -> CoreResult<(CartChange, CartItem)> {
        let index = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::ItemNotInCart(product_id.to_string()))?;

        let before = self.items[index].clone();
        let change = if before.qty <= 1 {
            self.items.remove(index);
            CartChange::Removed
        } else {
            self.items[index].qty -= 1;
            CartChange::Decremented
        };

        self.reprice(policy);
        Ok((change, before))
    }

    /// Empties the cart and zeroes all prices.
    pub fn clear(&mut self) {
        self.items.clear();
        self.prices = PriceBreakdown::zero();
    }

    fn reprice(&mut self, policy: &PricingPolicy) {
        self.prices = compute_prices(&self.items, policy);
    }
}

// =============================================================================
// Payment Result
// =============================================================================

/// What the payment provider reported for an order.
///
/// Before capture this holds only the remote order id (provisional).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Remote (provider) order id.
    pub id: String,
    pub status: String,
    pub email_address: String,
    #[ts(type = "string")]
    pub amount_captured: Money,
}

impl PaymentResult {
    /// Placeholder stored when a remote order is created, before capture.
    pub fn provisional(remote_order_id: impl Into<String>) -> Self {
        PaymentResult {
            id: remote_order_id.into(),
            status: String::new(),
            email_address: String::new(),
            amount_captured: Money::zero(),
        }
    }

    /// Whether the provider settled the funds.
    pub fn is_completed(&self) -> bool {
        self.status == CAPTURE_STATUS_COMPLETED
    }
}

// =============================================================================
// Order
// =============================================================================

/// Derived lifecycle state of an order.
///
/// ```text
/// Unpaid ──► PaymentInitiated ──► Paid ──► Delivered
///    │                             ▲
///    └──── mark paid (admin) ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Unpaid,
    PaymentInitiated,
    Paid,
    Delivered,
}

/// A line of an order. Immutable copy of the cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub order_id: String,
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    #[ts(type = "string")]
    pub price: Money,
    pub qty: i64,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    #[ts(flatten)]
    pub prices: PriceBreakdown,
    pub is_paid: bool,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Freezes a cart into a new unpaid order.
    pub fn from_cart(
        cart: &Cart,
        user_id: impl Into<String>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let items = cart
            .items
            .iter()
            .map(|line| OrderItem {
                order_id: id.clone(),
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                slug: line.slug.clone(),
                image: line.image.clone(),
                price: line.price,
                qty: line.qty,
            })
            .collect();

        Order {
            id,
            user_id: user_id.into(),
            shipping_address,
            payment_method,
            prices: cart.prices,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            payment_result: None,
            created_at: Utc::now(),
            items,
        }
    }

    pub fn status(&self) -> OrderStatus {
        if self.is_delivered {
            OrderStatus::Delivered
        } else if self.is_paid {
            OrderStatus::Paid
        } else if self.payment_result.is_some() {
            OrderStatus::PaymentInitiated
        } else {
            OrderStatus::Unpaid
        }
    }

    /// Remote order id stored by payment initiation, if any.
    pub fn remote_order_id(&self) -> Option<&str> {
        self.payment_result.as_ref().map(|r| r.id.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
