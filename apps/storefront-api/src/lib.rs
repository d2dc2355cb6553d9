//! # Storefront API
//!
//! HTTP server for the storefront cart, order and payment lifecycle.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API Services                          │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  CartService   │  │  OrderService  │  │  PaymentService            ││
//! │  │                │  │                │  │                            ││
//! │  │ • get_cart     │  │ • create_order │  │ • initiate_payment         ││
//! │  │ • add_item     │  │ • get_order    │  │ • confirm_payment          ││
//! │  │ • remove_item  │  │ • my_orders    │  │ • mark_paid_manually       ││
//! │  │ • merge_on_    │  │                │  │ • mark_delivered           ││
//! │  │   sign_in      │  │                │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                │
//! │  │ AccountService │  │ CatalogService │                                │
//! │  │                │  │                │                                │
//! │  │ • sign_up      │  │ • latest       │                                │
//! │  │ • sign_in      │  │ • by_slug      │                                │
//! │  │ • update_*     │  │                │                                │
//! │  └────────────────┘  └────────────────┘                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │   SQLite     │  │   PayPal     │  │  Session (JWT + cookie)  ││  │
//! │  │  │ storefront-db│  │  gateway     │  │                          ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables, see [`config::AppConfig`]:
//! - `STOREFRONT_PORT` - HTTP port (default: 3000)
//! - `STOREFRONT_DB_PATH` - SQLite file (default: storefront.db)
//! - `STOREFRONT_JWT_SECRET` - Secret for session tokens
//! - `STOREFRONT_TAX_RATE` - Tax rate as a fraction (default: 0.15)
//! - `STOREFRONT_PAYMENTS_CONFIG` - Path to payments.toml
//! - `RUST_LOG` - Log filter (default: `info,storefront=debug,sqlx=warn`)

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod session;

use std::sync::Arc;

use storefront_core::PricingPolicy;
use storefront_db::Database;
use storefront_payments::PaymentGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::SessionManager;

// Re-exports
pub use config::AppConfig;
pub use error::{ActionResult, ApiError, ApiResult, ErrorCode, Outcome};
pub use routes::build_router;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,storefront=debug,sqlx=warn";

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub gateway: Arc<dyn PaymentGateway>,
    pub sessions: SessionManager,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: AppConfig) -> Self {
        let sessions = SessionManager::new(config.jwt_secret.clone(), config.session_max_age_secs());
        AppState {
            db,
            gateway,
            sessions,
            config,
        }
    }

    /// Pricing policy applied to every cart mutation.
    pub fn pricing(&self) -> PricingPolicy {
        self.config.pricing_policy()
    }
}

/// Installs the global tracing subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Shared fixtures for service and route tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::Utc;
    use storefront_core::{Money, PaymentMethod, Product, Session, SessionContext, ShippingAddress, User};
    use storefront_db::{Database, DbConfig};
    use storefront_payments::{MockPaymentGateway, PaymentGateway};

    use crate::{AppConfig, AppState};

    pub async fn state_with(gateway: MockPaymentGateway) -> Arc<AppState> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
        Arc::new(AppState::new(db, gateway, AppConfig::default()))
    }

    pub async fn state() -> Arc<AppState> {
        state_with(MockPaymentGateway::new()).await
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

    pub fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Jane Doe".into(),
            street_address: "1 Main St".into(),
            city: "Springfield".into(),
            postal_code: "12345".into(),
            country: "USA".into(),
        }
    }

    /// Inserts a user with address and PayPal selected; returns its context.
    pub async fn checkout_ready_user(state: &AppState, email: &str) -> SessionContext {
        let mut user = User::new("Jane Doe", email, "hash".into());
        user.address = Some(address());
        user.payment_method = Some(PaymentMethod::PayPal);
        state.db.users().insert(&user).await.unwrap();
        signed_in(&user, "session-cart-1")
    }

    pub fn signed_in(user: &User, session_cart_id: &str) -> SessionContext {
        SessionContext::signed_in(
            Session {
                user_id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role,
            },
            session_cart_id,
        )
    }
}
