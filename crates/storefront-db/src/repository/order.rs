//! # Order Repository
//!
//! Order creation from a cart and the payment / delivery transitions.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     └── clear cart (version-checked)                                   │
//! │     └── insert order snapshot + one order_items row per cart line      │
//! │                                                                         │
//! │  2. INITIATE PAYMENT                                                   │
//! │     └── set_provisional_payment() → payment_result = {id, "", "", 0}   │
//! │                                                                         │
//! │  3. PAY (one transaction)                                              │
//! │     └── UPDATE orders ... WHERE is_paid = 0 [AND remote id matches]    │
//! │     └── decrement stock for every line                                 │
//! │                                                                         │
//! │  4. DELIVER                                                            │
//! │     └── UPDATE orders ... WHERE is_paid = 1 AND is_delivered = 0       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Racing Payments
//! The conditional `UPDATE ... WHERE is_paid = 0` is the first statement of
//! the pay transaction, so it takes the write lock. A second confirmation
//! waits for the first to commit, then matches zero rows and reports
//! [`OrderTransition::AlreadyPaid`]. Stock is decremented exactly once.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{cart, product};
use storefront_core::{
    Money, Order, OrderItem, PaymentMethod, PaymentResult, PriceBreakdown,
};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    shipping_address: String,
    payment_method: PaymentMethod,
    items_price_cents: i64,
    shipping_price_cents: i64,
    tax_price_cents: i64,
    total_price_cents: i64,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    payment_result: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        let payment_result = self
            .payment_result
            .as_deref()
            .map(serde_json::from_str::<PaymentResult>)
            .transpose()?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            shipping_address: serde_json::from_str(&self.shipping_address)?,
            payment_method: self.payment_method,
            prices: PriceBreakdown {
                items_price: Money::from_cents(self.items_price_cents),
                shipping_price: Money::from_cents(self.shipping_price_cents),
                tax_price: Money::from_cents(self.tax_price_cents),
                total_price: Money::from_cents(self.total_price_cents),
            },
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            payment_result,
            created_at: self.created_at,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    name: String,
    slug: String,
    image: String,
    price_cents: i64,
    qty: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            order_id: row.order_id,
            product_id: row.product_id,
            name: row.name,
            slug: row.slug,
            image: row.image,
            price: Money::from_cents(row.price_cents),
            qty: row.qty,
        }
    }
}

/// Flags used to explain why a conditional update matched nothing.
#[derive(Debug, FromRow)]
struct OrderFlags {
    is_paid: bool,
    is_delivered: bool,
    remote_id: Option<String>,
}

const ORDER_COLUMNS: &str = r#"
    id, user_id, shipping_address, payment_method,
    items_price_cents, shipping_price_cents, tax_price_cents, total_price_cents,
    is_paid, paid_at, is_delivered, delivered_at, payment_result, created_at
"#;

/// Outcome of a guarded order transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTransition {
    /// The update was applied.
    Applied,
    NotFound,
    /// Pay (or initiate payment) on an order that is already paid.
    AlreadyPaid,
    /// Deliver on an unpaid order.
    NotPaid,
    AlreadyDelivered,
    /// The stored provisional remote id differs from the captured one.
    RemoteIdMismatch,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists `order` and empties the cart it was frozen from.
    ///
    /// ## Atomicity
    /// All-or-nothing. If the cart changed since `cart_version` was read the
    /// transaction aborts with `StaleWrite`; if any line fails to insert
    /// (e.g. a product no longer in the catalog) nothing is written and the
    /// cart keeps its items.
    pub async fn create_from_cart(
        &self,
        order: &Order,
        cart_id: &str,
        cart_version: i64,
    ) -> DbResult<()> {
        debug!(order_id = %order.id, cart_id = %cart_id, "Creating order from cart");

        let mut tx = self.pool.begin().await?;

        cart::clear_checked(&mut tx, cart_id, cart_version).await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, shipping_address, payment_method,
                items_price_cents, shipping_price_cents, tax_price_cents, total_price_cents,
                is_paid, paid_at, is_delivered, delivered_at, payment_result, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, 0, NULL, NULL, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(serde_json::to_string(&order.shipping_address)?)
        .bind(order.payment_method)
        .bind(order.prices.items_price.cents())
        .bind(order.prices.shipping_price.cents())
        .bind(order.prices.tax_price.cents())
        .bind(order.prices.total_price.cents())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, name, slug, image, price_cents, qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&order.id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(&item.slug)
            .bind(&item.image)
            .bind(item.price.cents())
            .bind(item.qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            lines = order.items.len(),
            total = %order.prices.total_price,
            "Order created"
        );
        Ok(())
    }

    /// Gets an order with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => {
                let items = self.get_items(&row.id).await?;
                row.into_order(items).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.get_items(&row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }

    /// Gets the lines of an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT order_id, product_id, name, slug, image, price_cents, qty
            FROM order_items
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    /// Stores the provisional payment result of a newly created remote order.
    ///
    /// Only applies to unpaid orders. Re-initiating overwrites the previous
    /// provisional id.
    pub async fn set_provisional_payment(
        &self,
        order_id: &str,
        provisional: &PaymentResult,
    ) -> DbResult<OrderTransition> {
        let result =
            sqlx::query("UPDATE orders SET payment_result = ?2 WHERE id = ?1 AND is_paid = 0")
                .bind(order_id)
                .bind(serde_json::to_string(provisional)?)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 1 {
            debug!(order_id = %order_id, remote_id = %provisional.id, "Provisional payment stored");
            return Ok(OrderTransition::Applied);
        }

        let mut conn = self.pool.acquire().await?;
        Ok(match load_flags(&mut conn, order_id).await? {
            None => OrderTransition::NotFound,
            Some(_) => OrderTransition::AlreadyPaid,
        })
    }

    /// Marks an order paid and takes its lines out of stock.
    ///
    /// ## Arguments
    /// * `payment` - Captured result to store; `None` keeps the current value
    ///   (manual marking by an admin)
    /// * `expected_remote_id` - When set, the stored provisional id must match
    ///
    /// Everything happens in one transaction. Any outcome other than
    /// `Applied` leaves the order and stock untouched.
    pub async fn mark_paid(
        &self,
        order_id: &str,
        payment: Option<&PaymentResult>,
        expected_remote_id: Option<&str>,
        paid_at: DateTime<Utc>,
    ) -> DbResult<OrderTransition> {
        let payment_json = payment.map(serde_json::to_string).transpose()?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET
                is_paid = 1,
                paid_at = ?2,
                payment_result = COALESCE(?3, payment_result)
            WHERE id = ?1
              AND is_paid = 0
              AND (?4 IS NULL OR json_extract(payment_result, '$.id') = ?4)
            "#,
        )
        .bind(order_id)
        .bind(paid_at)
        .bind(payment_json)
        .bind(expected_remote_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let outcome = match load_flags(&mut tx, order_id).await? {
                None => OrderTransition::NotFound,
                Some(flags) if flags.is_paid => OrderTransition::AlreadyPaid,
                Some(_) => OrderTransition::RemoteIdMismatch,
            };
            tx.rollback().await?;
            debug!(order_id = %order_id, ?outcome, "Order not marked paid");
            return Ok(outcome);
        }

        let lines: Vec<(String, i64)> =
            sqlx::query_as("SELECT product_id, qty FROM order_items WHERE order_id = ?1")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await?;

        let mut shortfall = 0;
        for (product_id, qty) in &lines {
            shortfall += product::decrement_stock(&mut tx, product_id, *qty)
                .await?
                .shortfall;
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            lines = lines.len(),
            oversold_units = shortfall,
            captured = payment.is_some(),
            "Order marked paid"
        );
        Ok(OrderTransition::Applied)
    }

    /// Marks a paid order delivered.
    pub async fn mark_delivered(
        &self,
        order_id: &str,
        delivered_at: DateTime<Utc>,
    ) -> DbResult<OrderTransition> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET is_delivered = 1, delivered_at = ?2
            WHERE id = ?1 AND is_paid = 1 AND is_delivered = 0
            "#,
        )
        .bind(order_id)
        .bind(delivered_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            info!(order_id = %order_id, "Order marked delivered");
            return Ok(OrderTransition::Applied);
        }

        let mut conn = self.pool.acquire().await?;
        Ok(match load_flags(&mut conn, order_id).await? {
            None => OrderTransition::NotFound,
            Some(flags) if !flags.is_paid => OrderTransition::NotPaid,
            Some(flags) if flags.is_delivered => OrderTransition::AlreadyDelivered,
            // Concurrent writer changed the row between the update and the read.
            Some(_) => OrderTransition::AlreadyDelivered,
        })
    }
}

async fn load_flags(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Option<OrderFlags>> {
    let flags: Option<OrderFlags> = sqlx::query_as(
        r#"
        SELECT is_paid, is_delivered, json_extract(payment_result, '$.id') AS remote_id
        FROM orders WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(flags) = &flags {
        debug!(
            order_id = %order_id,
            is_paid = flags.is_paid,
            is_delivered = flags.is_delivered,
            remote_id = ?flags.remote_id,
            "Order flags"
        );
    }
    Ok(flags)
}

// =============================================================================
// Unit Tests
// =============================================================================
