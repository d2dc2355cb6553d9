//! API server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Payment provider settings live in their own file, see
//! [`storefront_payments::PaymentsConfig`].

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use storefront_core::{
    Money, PricingPolicy, TaxRate, DEFAULT_TAX_RATE_BPS, FLAT_SHIPPING_CENTS,
    FREE_SHIPPING_THRESHOLD_CENTS, SESSION_MAX_AGE_DAYS,
};

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Secret for signing session tokens
    pub jwt_secret: String,

    /// Session token and session-cart cookie lifetime, in days
    pub session_max_age_days: i64,

    /// Tax rate in basis points (1500 = 15%)
    pub tax_rate_bps: u32,

    /// Items price above which shipping is free, in cents
    pub free_shipping_over_cents: i64,

    /// Flat shipping fee, in cents
    pub flat_shipping_cents: i64,

    /// Optional path to payments.toml
    pub payments_config: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 3000,
            db_path: PathBuf::from("storefront.db"),
            jwt_secret: "storefront-dev-secret-change-in-production".to_string(),
            session_max_age_days: SESSION_MAX_AGE_DAYS,
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            free_shipping_over_cents: FREE_SHIPPING_THRESHOLD_CENTS,
            flat_shipping_cents: FLAT_SHIPPING_CENTS,
            payments_config: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (environment, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            port: parse_or(&lookup, "STOREFRONT_PORT", defaults.port)?,

            db_path: lookup("STOREFRONT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),

            // In production, this MUST be set via environment variable
            jwt_secret: lookup("STOREFRONT_JWT_SECRET").unwrap_or(defaults.jwt_secret),

            session_max_age_days: parse_or(
                &lookup,
                "STOREFRONT_SESSION_MAX_AGE_DAYS",
                defaults.session_max_age_days,
            )?,

            tax_rate_bps: match lookup("STOREFRONT_TAX_RATE") {
                Some(raw) => parse_tax_rate(&raw)?,
                None => defaults.tax_rate_bps,
            },

            free_shipping_over_cents: match lookup("STOREFRONT_FREE_SHIPPING_OVER") {
                Some(raw) => parse_amount("STOREFRONT_FREE_SHIPPING_OVER", &raw)?,
                None => defaults.free_shipping_over_cents,
            },

            flat_shipping_cents: match lookup("STOREFRONT_FLAT_SHIPPING") {
                Some(raw) => parse_amount("STOREFRONT_FLAT_SHIPPING", &raw)?,
                None => defaults.flat_shipping_cents,
            },

            payments_config: lookup("STOREFRONT_PAYMENTS_CONFIG").map(PathBuf::from),
        };

        if config.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue("STOREFRONT_JWT_SECRET".to_string()));
        }
        if config.session_max_age_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "STOREFRONT_SESSION_MAX_AGE_DAYS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pricing policy the cart and checkout use.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            tax_rate: TaxRate::from_bps(self.tax_rate_bps),
            free_shipping_over: Money::from_cents(self.free_shipping_over_cents),
            flat_shipping: Money::from_cents(self.flat_shipping_cents),
        }
    }

    /// Session lifetime in seconds.
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_max_age_days * 24 * 60 * 60
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Accepts a fraction ("0.15") and converts it to basis points.
fn parse_tax_rate(raw: &str) -> Result<u32, ConfigError> {
    let invalid = || ConfigError::InvalidValue("STOREFRONT_TAX_RATE".to_string());
    let fraction: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(invalid());
    }
    Ok(TaxRate::from_fraction(fraction).bps())
}

/// Accepts a decimal amount ("100.00") and converts it to cents.
fn parse_amount(key: &str, raw: &str) -> Result<i64, ConfigError> {
    let amount: Money = raw
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))?;
    if amount.is_negative() {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(amount.cents())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to load payments configuration: {0}")]
    Payments(#[from] storefront_payments::GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.session_max_age_days, 30);

        let policy = config.pricing_policy();
        assert_eq!(policy.tax_rate.bps(), 1500);
        assert_eq!(policy.free_shipping_over.cents(), 10_000);
        assert_eq!(policy.flat_shipping.cents(), 1_000);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("STOREFRONT_PORT", "8080"),
            ("STOREFRONT_TAX_RATE", "0.08"),
            ("STOREFRONT_FREE_SHIPPING_OVER", "50.00"),
            ("STOREFRONT_FLAT_SHIPPING", "4.99"),
            ("STOREFRONT_DB_PATH", "/var/lib/storefront/shop.db"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.tax_rate_bps, 800);
        assert_eq!(config.free_shipping_over_cents, 5_000);
        assert_eq!(config.flat_shipping_cents, 499);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/storefront/shop.db"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[("STOREFRONT_PORT", "http")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("STOREFRONT_TAX_RATE", "1.5")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("STOREFRONT_FLAT_SHIPPING", "-1")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("STOREFRONT_JWT_SECRET", "short")])).is_err());
    }
}
