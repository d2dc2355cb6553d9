//! # Cart Repository
//!
//! Cart storage keyed by session or user, with version-checked writes.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  guest browses          signs in                  checks out            │
//! │       │                    │                          │                 │
//! │       ▼                    ▼                          ▼                 │
//! │  carts row              reassign_to_user()        clear (in order tx)   │
//! │  session_cart_id = S    user cart U deleted       items = [], prices 0  │
//! │  user_id = NULL         guest cart: user_id = U   version + 1           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lost Updates
//! Every write is `UPDATE ... WHERE id = ? AND version = ?` and bumps the
//! version. Zero rows affected means someone else wrote first: the caller gets
//! [`DbError::StaleWrite`] and retries from a fresh read.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use storefront_core::{Cart, Money, OwnerKey, PriceBreakdown};

/// Row shape of the `carts` table.
#[derive(Debug, FromRow)]
struct CartRow {
    id: String,
    session_cart_id: String,
    user_id: Option<String>,
    items: String,
    items_price_cents: i64,
    shipping_price_cents: i64,
    tax_price_cents: i64,
    total_price_cents: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = DbError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        Ok(Cart {
            id: row.id,
            session_cart_id: row.session_cart_id,
            user_id: row.user_id,
            items: serde_json::from_str(&row.items)?,
            prices: PriceBreakdown {
                items_price: Money::from_cents(row.items_price_cents),
                shipping_price: Money::from_cents(row.shipping_price_cents),
                tax_price: Money::from_cents(row.tax_price_cents),
                total_price: Money::from_cents(row.total_price_cents),
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CART_COLUMNS: &str = r#"
    id, session_cart_id, user_id, items,
    items_price_cents, shipping_price_cents, tax_price_cents, total_price_cents,
    version, created_at, updated_at
"#;

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Finds the cart for an owner.
    ///
    /// A session lookup only matches guest carts: once a cart has been handed
    /// to a user, the session-cart id no longer reaches it.
    pub async fn find_by_owner(&self, owner: &OwnerKey) -> DbResult<Option<Cart>> {
        let (filter, key) = match owner {
            OwnerKey::User(user_id) => ("user_id = ?1", user_id),
            OwnerKey::Session(session_cart_id) => {
                ("session_cart_id = ?1 AND user_id IS NULL", session_cart_id)
            }
        };

        let row: Option<CartRow> = sqlx::query_as(&format!(
            "SELECT {} FROM carts WHERE {}",
            CART_COLUMNS, filter
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Cart::try_from).transpose()
    }

    /// Gets a cart by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let row: Option<CartRow> =
            sqlx::query_as(&format!("SELECT {} FROM carts WHERE id = ?1", CART_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Cart::try_from).transpose()
    }

    /// Inserts a new cart.
    ///
    /// A concurrent request that created the owner's cart first surfaces as
    /// `StaleWrite`, so the caller re-reads and updates that cart instead.
    pub async fn insert(&self, cart: &Cart) -> DbResult<()> {
        debug!(cart_id = %cart.id, owner = %cart.owner(), "Inserting cart");

        let result = sqlx::query(
            r#"
            INSERT INTO carts (
                id, session_cart_id, user_id, items,
                items_price_cents, shipping_price_cents, tax_price_cents, total_price_cents,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&cart.id)
        .bind(&cart.session_cart_id)
        .bind(&cart.user_id)
        .bind(serde_json::to_string(&cart.items)?)
        .bind(cart.prices.items_price.cents())
        .bind(cart.prices.shipping_price.cents())
        .bind(cart.prices.tax_price.cents())
        .bind(cart.prices.total_price.cents())
        .bind(cart.version)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if field.starts_with("carts.") => {
                    Err(DbError::stale("Cart", &cart.id))
                }
                other => Err(other),
            },
        }
    }

    /// Writes the cart's items and prices if nobody wrote since it was read.
    ///
    /// On success `cart.version` and `cart.updated_at` reflect the stored row.
    pub async fn save(&self, cart: &mut Cart) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE carts SET
                items = ?3,
                items_price_cents = ?4,
                shipping_price_cents = ?5,
                tax_price_cents = ?6,
                total_price_cents = ?7,
                version = version + 1,
                updated_at = ?8
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&cart.id)
        .bind(cart.version)
        .bind(serde_json::to_string(&cart.items)?)
        .bind(cart.prices.items_price.cents())
        .bind(cart.prices.shipping_price.cents())
        .bind(cart.prices.tax_price.cents())
        .bind(cart.prices.total_price.cents())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(cart_id = %cart.id, version = cart.version, "Stale cart write");
            return Err(DbError::stale("Cart", &cart.id));
        }

        cart.version += 1;
        cart.updated_at = now;
        Ok(())
    }

    /// Hands the guest cart of a session to a user at sign-in.
    ///
    /// ## Behavior
    /// - Guest cart exists: the user's existing cart (if any) is deleted and
    ///   the guest cart is re-keyed to the user. Items are not merged.
    /// - No guest cart: nothing changes.
    ///
    /// Both steps run in one transaction. Returns whether a cart was moved.
    pub async fn reassign_to_user(&self, session_cart_id: &str, user_id: &str) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM carts
            WHERE user_id = ?1
              AND EXISTS (
                  SELECT 1 FROM carts WHERE session_cart_id = ?2 AND user_id IS NULL
              )
            "#,
        )
        .bind(user_id)
        .bind(session_cart_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let moved = sqlx::query(
            r#"
            UPDATE carts SET
                user_id = ?1,
                version = version + 1,
                updated_at = ?3
            WHERE session_cart_id = ?2 AND user_id IS NULL
            "#,
        )
        .bind(user_id)
        .bind(session_cart_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if moved > 0 {
            info!(
                user_id = %user_id,
                replaced_user_cart = deleted > 0,
                "Guest cart assigned to user"
            );
        }
        Ok(moved > 0)
    }
}

/// Empties a cart inside an open transaction, checking its version.
pub(crate) async fn clear_checked(
    conn: &mut SqliteConnection,
    cart_id: &str,
    expected_version: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE carts SET
            items = '[]',
            items_price_cents = 0,
            shipping_price_cents = 0,
            tax_price_cents = 0,
            total_price_cents = 0,
            version = version + 1,
            updated_at = ?3
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(cart_id)
    .bind(expected_version)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::stale("Cart", cart_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use storefront_core::PricingPolicy;

    #[tokio::test]
    async fn test_insert_and_find_by_session() {
        let db = fixtures::test_db().await;
        let product = fixtures::product("p1", 2500, 5);
        let mut cart = Cart::new("sess-1", None);
        cart.add_product(&product, &PricingPolicy::default()).unwrap();
        db.carts().insert(&cart).await.unwrap();

        let found = db
            .carts()
            .find_by_owner(&OwnerKey::Session("sess-1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, cart.id);
        assert_eq!(found.items, cart.items);
        assert_eq!(found.prices, cart.prices);

        assert!(db
            .carts()
            .find_by_owner(&OwnerKey::Session("other".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_rejects_stale_version() {
        let db = fixtures::test_db().await;
        let policy = PricingPolicy::default();
        let product = fixtures::product("p1", 2500, 5);

        let cart = Cart::new("sess-1", None);
        db.carts().insert(&cart).await.unwrap();

        let mut first = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first.add_product(&product, &policy).unwrap();
        db.carts().save(&mut first).await.unwrap();
        assert_eq!(first.version, 1);

        second.add_product(&product, &policy).unwrap();
        let err = db.carts().save(&mut second).await.unwrap_err();
        assert!(err.is_stale_write());

        let stored = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_guest_cart_is_stale() {
        let db = fixtures::test_db().await;
        db.carts().insert(&Cart::new("sess-1", None)).await.unwrap();

        let err = db
            .carts()
            .insert(&Cart::new("sess-1", None))
            .await
            .unwrap_err();
        assert!(err.is_stale_write());
    }

    #[tokio::test]
    async fn test_reassign_replaces_user_cart() {
        let db = fixtures::test_db().await;
        let policy = PricingPolicy::default();
        db.users().insert(&fixtures::user("u1")).await.unwrap();

        let mut user_cart = Cart::new("old-session", Some("u1".into()));
        user_cart
            .add_product(&fixtures::product("old", 999, 5), &policy)
            .unwrap();
        db.carts().insert(&user_cart).await.unwrap();

        let mut guest = Cart::new("sess-1", None);
        guest.add_product(&fixtures::product("a", 2500, 5), &policy).unwrap();
        guest.add_product(&fixtures::product("b", 1500, 5), &policy).unwrap();
        db.carts().insert(&guest).await.unwrap();

        assert!(db.carts().reassign_to_user("sess-1", "u1").await.unwrap());

        let owned = db
            .carts()
            .find_by_owner(&OwnerKey::User("u1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owned.id, guest.id);
        assert_eq!(owned.items, guest.items);
        assert_eq!(owned.prices, guest.prices);

        assert!(db.carts().get_by_id(&user_cart.id).await.unwrap().is_none());
        assert!(db
            .carts()
            .find_by_owner(&OwnerKey::Session("sess-1".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reassign_without_guest_cart_is_noop() {
        let db = fixtures::test_db().await;
        db.users().insert(&fixtures::user("u1")).await.unwrap();
        let user_cart = Cart::new("old-session", Some("u1".into()));
        db.carts().insert(&user_cart).await.unwrap();

        assert!(!db.carts().reassign_to_user("sess-1", "u1").await.unwrap());
        assert!(db.carts().get_by_id(&user_cart.id).await.unwrap().is_some());
    }
}
