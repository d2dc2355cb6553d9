//! Cart service implementation.
//!
//! ## Write Path
//! ```text
//! read cart (by owner key) ──► mutate in memory ──► versioned write
//!        ▲                                               │
//!        └──────────── StaleWrite (bounded) ─────────────┘
//! ```
//!
//! A lost race re-reads the cart and re-applies the change. After
//! [`MAX_CART_WRITE_ATTEMPTS`] the conflict is reported to the caller.

use std::sync::Arc;

use tracing::{debug, info};

use storefront_core::validation::validate_cart_item;
use storefront_core::{Cart, CartItem, CoreError, OwnerKey, SessionContext};
use storefront_db::DbError;

use crate::error::{ApiError, ApiResult, Outcome};
use crate::AppState;

/// Attempts per cart mutation before a version conflict is surfaced.
pub const MAX_CART_WRITE_ATTEMPTS: u32 = 3;

/// Cart service implementation.
pub struct CartService {
    state: Arc<AppState>,
}

impl CartService {
    /// Create a new cart service.
    pub fn new(state: Arc<AppState>) -> Self {
        CartService { state }
    }

    /// The caller's cart: by user id when signed in, by session-cart id
    /// otherwise.
    pub async fn get_cart(&self, ctx: &SessionContext) -> ApiResult<Option<Cart>> {
        Ok(self.state.db.carts().find_by_owner(&ctx.owner_key()).await?)
    }

    /// Adds one unit of a catalog product to the caller's cart.
    ///
    /// The line is snapshotted from the catalog (name, slug, image, price);
    /// a cart is created on first add.
    pub async fn add_item(&self, ctx: &SessionContext, product_id: &str) -> ApiResult<Outcome<Cart>> {
        if product_id.trim().is_empty() {
            return Err(ApiError::validation("productId is required"));
        }

        let product = self
            .state
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        validate_cart_item(&CartItem::from_product(&product))?;

        let policy = self.state.pricing();
        let owner = ctx.owner_key();
        let carts = self.state.db.carts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let (mut cart, is_new) = match carts.find_by_owner(&owner).await? {
                Some(cart) => (cart, false),
                None => (
                    Cart::new(&ctx.session_cart_id, ctx.user_id().map(str::to_string)),
                    true,
                ),
            };

            let change = cart.add_product(&product, &policy)?;

            let written = if is_new {
                carts.insert(&cart).await
            } else {
                carts.save(&mut cart).await
            };

            match written {
                Ok(()) => {
                    info!(
                        cart_id = %cart.id,
                        owner = %owner,
                        product_id = %product.id,
                        ?change,
                        "Cart item added"
                    );
                    info!(slug = %product.slug, "product page invalidated");
                    return Ok(Outcome::new(change.message(&product.name)).with_data(cart));
                }
                Err(e) => retry_or_fail(e, attempt, &owner)?,
            }
        }
    }

    /// Removes one unit of a product from the caller's cart.
    pub async fn remove_item(&self, ctx: &SessionContext, product_id: &str) -> ApiResult<Outcome<Cart>> {
        let policy = self.state.pricing();
        let owner = ctx.owner_key();
        let carts = self.state.db.carts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut cart = carts
                .find_by_owner(&owner)
                .await?
                .ok_or(CoreError::CartNotFound)?;

            let (change, line) = cart.remove_product(product_id, &policy)?;

            match carts.save(&mut cart).await {
                Ok(()) => {
                    info!(cart_id = %cart.id, product_id = %product_id, ?change, "Cart item removed");
                    info!(slug = %line.slug, "product page invalidated");
                    return Ok(Outcome::new(change.message(&line.name)).with_data(cart));
                }
                Err(e) => retry_or_fail(e, attempt, &owner)?,
            }
        }
    }

    /// Hands the session's guest cart to a user who just signed in.
    ///
    /// The guest cart replaces any cart the user already had. Without a guest
    /// cart nothing changes.
    pub async fn merge_on_sign_in(&self, session_cart_id: &str, user_id: &str) -> ApiResult<bool> {
        let moved = self
            .state
            .db
            .carts()
            .reassign_to_user(session_cart_id, user_id)
            .await?;

        debug!(user_id = %user_id, moved, "Sign-in cart merge finished");
        Ok(moved)
    }
}

/// Swallows a stale write that still has attempts left; anything else fails.
fn retry_or_fail(err: DbError, attempt: u32, owner: &OwnerKey) -> ApiResult<()> {
    if err.is_stale_write() && attempt < MAX_CART_WRITE_ATTEMPTS {
        debug!(owner = %owner, attempt, "Cart changed concurrently, retrying from a fresh read");
        return Ok(());
    }
    Err(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{product, state};
    use storefront_core::{Money, User};

    async fn service_with(products: &[(&str, i64, i64)]) -> (CartService, Arc<AppState>) {
        let state = state().await;
        for (id, price, stock) in products {
            state.db.products().insert(&product(id, *price, *stock)).await.unwrap();
        }
        (CartService::new(state.clone()), state)
    }

    #[tokio::test]
    async fn test_first_add_creates_cart() {
        let (service, _) = service_with(&[("p1", 2500, 10)]).await;
        let ctx = SessionContext::guest("guest-1");

        assert!(service.get_cart(&ctx).await.unwrap().is_none());

        let outcome = service.add_item(&ctx, "p1").await.unwrap();
        assert_eq!(outcome.message, "Product p1 added to cart successfully");

        let cart = service.get_cart(&ctx).await.unwrap().unwrap();
        assert_eq!(cart.session_cart_id, "guest-1");
        assert!(cart.user_id.is_none());
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].qty, 1);
        assert_eq!(cart.prices.items_price, Money::from_cents(2500));
        assert_eq!(cart.prices.shipping_price, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_stock_limit_leaves_cart_unchanged() {
        let (service, _) = service_with(&[("p1", 2500, 1)]).await;
        let ctx = SessionContext::guest("guest-1");

        service.add_item(&ctx, "p1").await.unwrap();
        let err = service.add_item(&ctx, "p1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.message, "Not enough stock");

        let cart = service.get_cart(&ctx).await.unwrap().unwrap();
        assert_eq!(cart.items[0].qty, 1);
        assert_eq!(cart.version, 0);
    }

    #[tokio::test]
    async fn test_out_of_stock_product_never_creates_cart() {
        let (service, _) = service_with(&[("p1", 2500, 0)]).await;
        let ctx = SessionContext::guest("guest-1");

        let err = service.add_item(&ctx, "p1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(service.get_cart(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (service, _) = service_with(&[]).await;
        let err = service.add_item(&SessionContext::guest("g"), "missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Product not found");
    }

    #[tokio::test]
    async fn test_add_increments_and_remove_decrements() {
        let (service, _) = service_with(&[("p1", 2500, 10), ("p2", 1000, 10)]).await;
        let ctx = SessionContext::guest("guest-1");

        for _ in 0..3 {
            service.add_item(&ctx, "p1").await.unwrap();
        }
        let outcome = service.add_item(&ctx, "p2").await.unwrap();
        let cart = outcome.data.unwrap();
        assert_eq!(cart.find_item("p1").unwrap().qty, 3);
        assert_eq!(cart.prices.items_price, Money::from_cents(8500));

        let outcome = service.remove_item(&ctx, "p1").await.unwrap();
        assert_eq!(outcome.message, "Product p1 updated in cart successfully");
        let cart = outcome.data.unwrap();
        assert_eq!(cart.find_item("p1").unwrap().qty, 2);
        assert_eq!(cart.prices.items_price, Money::from_cents(6000));

        let outcome = service.remove_item(&ctx, "p2").await.unwrap();
        assert_eq!(outcome.message, "Product p2 removed from cart successfully");
        assert!(outcome.data.unwrap().find_item("p2").is_none());
    }

    #[tokio::test]
    async fn test_remove_errors() {
        let (service, _) = service_with(&[("p1", 2500, 10)]).await;
        let ctx = SessionContext::guest("guest-1");

        let err = service.remove_item(&ctx, "p1").await.unwrap_err();
        assert_eq!(err.message, "Cart not found");

        service.add_item(&ctx, "p1").await.unwrap();
        let err = service.remove_item(&ctx, "p9").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Item not found");
    }

    #[tokio::test]
    async fn test_guest_cart_replaces_user_cart_on_sign_in() {
        let (service, state) = service_with(&[("p1", 2500, 10), ("p2", 1000, 10), ("p3", 500, 10)]).await;

        let user = User::new("Jane Doe", "jane@example.com", "hash".into());
        state.db.users().insert(&user).await.unwrap();
        let user_ctx = crate::test_support::signed_in(&user, "old-session");
        service.add_item(&user_ctx, "p3").await.unwrap();

        let guest = SessionContext::guest("guest-1");
        service.add_item(&guest, "p1").await.unwrap();
        let guest_cart = service.add_item(&guest, "p2").await.unwrap().data.unwrap();

        assert!(service.merge_on_sign_in("guest-1", &user.id).await.unwrap());

        let merged = service.get_cart(&user_ctx).await.unwrap().unwrap();
        assert_eq!(merged.items, guest_cart.items);
        assert_eq!(merged.prices, guest_cart.prices);
        assert!(merged.find_item("p3").is_none());

        // The session id no longer reaches a cart that belongs to a user
        assert!(service.get_cart(&guest).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_without_guest_cart_is_noop() {
        let (service, state) = service_with(&[("p1", 2500, 10)]).await;
        let user = User::new("Jane Doe", "jane@example.com", "hash".into());
        state.db.users().insert(&user).await.unwrap();
        let user_ctx = crate::test_support::signed_in(&user, "s");
        service.add_item(&user_ctx, "p1").await.unwrap();

        assert!(!service.merge_on_sign_in("fresh-session", &user.id).await.unwrap());
        let cart = service.get_cart(&user_ctx).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let (service, _) = service_with(&[("p1", 100, 50)]).await;
        let service = Arc::new(service);
        let ctx = SessionContext::guest("guest-1");
        service.add_item(&ctx, "p1").await.unwrap();

        let a = {
            let (service, ctx) = (service.clone(), ctx.clone());
            tokio::spawn(async move { service.add_item(&ctx, "p1").await })
        };
        let b = {
            let (service, ctx) = (service.clone(), ctx.clone());
            tokio::spawn(async move { service.add_item(&ctx, "p1").await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        let succeeded = results.iter().filter(|r| r.is_ok()).count() as i64;

        let cart = service.get_cart(&ctx).await.unwrap().unwrap();
        assert_eq!(cart.find_item("p1").unwrap().qty, 1 + succeeded);
    }
}
