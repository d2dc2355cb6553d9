//! # Seed Data Loader
//!
//! Populates the database with a sample catalog and two accounts for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p storefront-api --bin seed
//!
//! # Specify database path
//! cargo run -p storefront-api --bin seed -- --db ./data/storefront.db
//! ```
//!
//! ## Accounts
//! - `admin@example.com` (admin)
//! - `user@example.com` (customer)
//!
//! Both use the password from `SEED_PASSWORD`, or `123456` when unset.

use std::env;

use chrono::Utc;
use uuid::Uuid;

use storefront_api::auth::hash_password;
use storefront_core::{Money, Product, Role, User};
use storefront_db::{Database, DbConfig};

/// (name, slug, brand, price in cents, stock, rating, reviews, featured)
const PRODUCTS: &[(&str, &str, &str, i64, i64, f64, i64, bool)] = &[
    ("Polo Sporting Stretch Shirt", "polo-sporting-stretch-shirt", "Polo", 5999, 5, 4.5, 10, true),
    ("Brooks Brothers Long Sleeved Shirt", "brooks-brothers-long-sleeved-shirt", "Brooks Brothers", 8590, 10, 4.2, 8, true),
    ("Tommy Hilfiger Classic Fit Dress Shirt", "tommy-hilfiger-classic-fit-dress-shirt", "Tommy Hilfiger", 9995, 0, 4.9, 3, false),
    ("Calvin Klein Slim Fit Stretch Shirt", "calvin-klein-slim-fit-stretch-shirt", "Calvin Klein", 3995, 10, 3.6, 5, false),
    ("Polo Ralph Lauren Oxford Shirt", "polo-ralph-lauren-oxford-shirt", "Polo", 7999, 10, 4.7, 18, false),
    ("Polo Classic Pink Hoodie", "polo-classic-pink-hoodie", "Polo", 9999, 1, 4.6, 12, false),
];

const DEFAULT_PASSWORD: &str = "123456";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = env::var("STOREFRONT_DB_PATH").unwrap_or_else(|_| String::from("./storefront.db"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Loader");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront.db)");
                println!("  -h, --help         Show this help message");
                println!();
                println!("Environment:");
                println!("  SEED_PASSWORD      Password for the seeded accounts (default: 123456)");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Storefront Seed Data Loader");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Loading catalog...");
    let mut loaded = 0;
    for (idx, row) in PRODUCTS.iter().enumerate() {
        let product = sample_product(idx, row);
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.slug, e);
            continue;
        }
        loaded += 1;
    }
    println!("✓ Loaded {} products", loaded);

    println!();
    println!("Creating accounts...");
    let password = env::var("SEED_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string());
    let hash = hash_password(&password)?;

    let mut admin = User::new("Admin", "admin@example.com", hash.clone());
    admin.role = Role::Admin;
    let customer = User::new("Jane Customer", "user@example.com", hash);

    for user in [&admin, &customer] {
        match db.users().insert(user).await {
            Ok(()) => println!("  {} ({})", user.email, user.role),
            Err(e) => eprintln!("Failed to create {}: {}", user.email, e),
        }
    }

    db.close().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn sample_product(idx: usize, row: &(&str, &str, &str, i64, i64, f64, i64, bool)) -> Product {
    let (name, slug, brand, price_cents, stock, rating, num_reviews, is_featured) = *row;

    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
        category: "Men's Dress Shirts".to_string(),
        brand: brand.to_string(),
        description: format!("{} in a comfortable everyday fit", name),
        images: vec![
            format!("/images/sample-products/p{}-1.jpg", idx + 1),
            format!("/images/sample-products/p{}-2.jpg", idx + 1),
        ],
        price: Money::from_cents(price_cents),
        stock,
        rating,
        num_reviews,
        is_featured,
        banner: is_featured.then(|| format!("banner-{}.jpg", idx + 1)),
        created_at: Utc::now(),
    }
}
