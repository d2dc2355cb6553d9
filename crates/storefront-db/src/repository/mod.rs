//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  storefront-api service                                                │
//! │       │                                                                 │
//! │       │  db.carts().find_by_owner(&ctx.owner_key())                    │
//! │       ▼                                                                 │
//! │  CartRepository / OrderRepository / ProductRepository / UserRepository │
//! │       │                                                                 │
//! │       │  SQL, row structs, JSON columns                                │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Row structs (`*Row`) mirror the tables one to one and convert into the
//! domain types from storefront-core. JSON never leaves this module.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads, stock
//! - [`cart::CartRepository`] - Cart storage, version checks, sign-in hand-over
//! - [`order::OrderRepository`] - Order creation and payment/delivery transitions
//! - [`user::UserRepository`] - Accounts, saved address and payment method

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use storefront_core::{Money, Product, ShippingAddress, User};

    use crate::{Database, DbConfig};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn product(id: &str, price_cents: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            slug: format!("product-{}", id),
            category: "Shirts".to_string(),
            brand: "Polo".to_string(),
            description: "A product".to_string(),
            images: vec![format!("/images/{}.jpg", id)],
            price: Money::from_cents(price_cents),
            stock,
            rating: 4.0,
            num_reviews: 3,
            is_featured: false,
            banner: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(id: &str) -> User {
        let mut user = User::new("Jane Doe", format!("{}@example.com", id), "hash".into());
        user.id = id.to_string();
        user
    }

    pub fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Jane Doe".into(),
            street_address: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country: "USA".into(),
        }
    }
}
