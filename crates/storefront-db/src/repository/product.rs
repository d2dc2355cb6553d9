//! # Product Repository
//!
//! Catalog reads plus the stock decrement used when an order is paid.
//!
//! The catalog itself is maintained outside the lifecycle (seed loader, admin
//! tooling). The lifecycle only reads price and stock.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use storefront_core::{Money, Product};

/// Row shape of the `products` table.
#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    slug: String,
    category: String,
    brand: String,
    description: String,
    images: String,
    price_cents: i64,
    stock: i64,
    rating: f64,
    num_reviews: i64,
    is_featured: bool,
    banner: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = crate::error::DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            slug: row.slug,
            category: row.category,
            brand: row.brand,
            description: row.description,
            images: serde_json::from_str(&row.images)?,
            price: Money::from_cents(row.price_cents),
            stock: row.stock,
            rating: row.rating,
            num_reviews: row.num_reviews,
            is_featured: row.is_featured,
            banner: row.banner,
            created_at: row.created_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = r#"
    id, name, slug, category, brand, description, images,
    price_cents, stock, rating, num_reviews, is_featured, banner, created_at
"#;

/// Result of decrementing one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockDecrement {
    /// Units taken off the shelf.
    pub applied: i64,
    /// Units the order asked for beyond what was on hand.
    pub shortfall: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Gets a product by its URL slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE slug = ?1",
            PRODUCT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists the newest products first.
    pub async fn list_latest(&self, limit: u32) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products ORDER BY created_at DESC, id LIMIT ?1",
            PRODUCT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, slug = %product.slug, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, slug, category, brand, description, images,
                price_cents, stock, rating, num_reviews, is_featured, banner, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.description)
        .bind(serde_json::to_string(&product.images)?)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.is_featured)
        .bind(&product.banner)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts catalog products (seed loader, diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Decrements stock inside an open transaction.
///
/// Stock never goes below zero. An order that was priced while stock was
/// available may still be paid after another order took the last units; the
/// shortfall is reported and logged instead of failing the payment.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    qty: i64,
) -> DbResult<StockDecrement> {
    let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(stock) = stock else {
        warn!(product_id = %product_id, qty, "Paid order references a missing product");
        return Ok(StockDecrement {
            applied: 0,
            shortfall: qty,
        });
    };

    let applied = qty.min(stock).max(0);
    sqlx::query("UPDATE products SET stock = stock - ?2 WHERE id = ?1")
        .bind(product_id)
        .bind(applied)
        .execute(&mut *conn)
        .await?;

    let shortfall = qty - applied;
    if shortfall > 0 {
        warn!(
            product_id = %product_id,
            requested = qty,
            available = stock,
            "Oversold product: stock clamped at zero"
        );
    }

    Ok(StockDecrement { applied, shortfall })
}
