//! # Storefront API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API Server                            │
//! │                                                                         │
//! │  env ──► AppConfig ──► SQLite (migrations) ──┐                          │
//! │                                              ├──► axum (3000)           │
//! │  payments.toml + env ──► PayPalClient ───────┘                          │
//! │                                                                         │
//! │  Browser ───► HTTP ───► session layer ───► services ───► SQLite        │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                               PayPal                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storefront_api::{build_router, init_tracing, AppConfig, AppState};
use storefront_db::{Database, DbConfig};
use storefront_payments::{PayPalClient, PaymentGateway, PaymentsConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Storefront API server...");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        port = config.port,
        db_path = %config.db_path.display(),
        tax_rate_bps = config.tax_rate_bps,
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(DbConfig::new(&config.db_path))
        .await
        .context("failed to open database")?;
    info!("Database ready");

    // Payment gateway
    let payments = PaymentsConfig::load(config.payments_config.clone())?;
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PayPalClient::new(&payments)?);
    info!(api_url = %payments.paypal.api_url, currency = %payments.paypal.currency, "Payment gateway configured");

    // Create shared state
    let state = Arc::new(AppState::new(db.clone(), gateway, config.clone()));
    let app = build_router(state);

    // Build server address
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
