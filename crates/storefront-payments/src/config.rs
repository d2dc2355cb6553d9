//! # Payments Configuration
//!
//! Configuration for the PayPal client and its HTTP behaviour.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PAYPAL_CLIENT_ID=...  PAYPAL_APP_SECRET=...                        │
//! │     PAYPAL_API_URL=https://api-m.paypal.com  PAYPAL_CURRENCY=USD       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/payments.toml (Linux)                         │
//! │     ~/Library/Application Support/com.storefront.storefront/...        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Sandbox API, USD, 15s timeout, 3 attempts                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # payments.toml
//! [paypal]
//! api_url = "https://api-m.sandbox.paypal.com"
//! client_id = "your-sandbox-client-id"
//! app_secret = "your-sandbox-app-secret"
//! currency = "USD"
//!
//! [http]
//! request_timeout_secs = 15
//! max_attempts = 3
//! initial_backoff_ms = 200
//! max_backoff_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

// =============================================================================
// PayPal Settings
// =============================================================================

/// Provider endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPalSettings {
    /// REST API base URL (sandbox by default).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub app_secret: String,

    /// ISO 4217 code sent with every remote order.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_api_url() -> String {
    "https://api-m.sandbox.paypal.com".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for PayPalSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            client_id: String::new(),
            app_secret: String::new(),
            currency: default_currency(),
        }
    }
}

// =============================================================================
// HTTP Settings
// =============================================================================

/// Timeout and retry behaviour for provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Upper bound for a single call, including the token fetch.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per operation, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    2000
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Payments Config
// =============================================================================

/// Complete payments configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub paypal: PayPalSettings,

    #[serde(default)]
    pub http: HttpSettings,
}

impl PaymentsConfig {
    /// Loads configuration from file, then applies environment overrides.
    ///
    /// A missing file is not an error; defaults plus environment apply.
    pub fn load(config_path: Option<PathBuf>) -> GatewayResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading payments config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Payments config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        if !config.has_credentials() {
            warn!("PayPal credentials not configured; PayPal payments will fail");
        }

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        let url = url::Url::parse(&self.paypal.api_url)?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(GatewayError::InvalidConfig(format!(
                "api_url must start with http:// or https://, got: {}",
                self.paypal.api_url
            )));
        }

        let currency = &self.paypal.currency;
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(GatewayError::InvalidConfig(format!(
                "currency must be a 3-letter ISO code, got: {}",
                currency
            )));
        }

        if self.http.request_timeout_secs == 0 {
            return Err(GatewayError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.http.max_attempts == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// True when both the client id and the app secret are set.
    pub fn has_credentials(&self) -> bool {
        !self.paypal.client_id.trim().is_empty() && !self.paypal.app_secret.trim().is_empty()
    }

    /// Applies `PAYPAL_*` overrides from the given lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("PAYPAL_API_URL") {
            debug!(url = %url, "Overriding PayPal API URL from environment");
            self.paypal.api_url = url;
        }

        if let Some(id) = lookup("PAYPAL_CLIENT_ID") {
            self.paypal.client_id = id;
        }

        if let Some(secret) = lookup("PAYPAL_APP_SECRET") {
            self.paypal.app_secret = secret;
        }

        if let Some(currency) = lookup("PAYPAL_CURRENCY") {
            self.paypal.currency = currency.to_uppercase();
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "storefront", "storefront")
            .map(|dirs| dirs.config_dir().join("payments.toml"))
    }
}
