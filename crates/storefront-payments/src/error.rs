//! # Gateway Error Types
//!
//! Error types for payment network operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Gateway Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────┐  ┌─────────────────────┐ │
//! │  │  Configuration      │  │   Transport     │  │     Provider        │ │
//! │  │                     │  │                 │  │                     │ │
//! │  │  InvalidConfig      │  │  Connection     │  │  Api { status }     │ │
//! │  │  ConfigLoadFailed   │  │  Timeout        │  │  TokenRejected      │ │
//! │  │  MissingCredentials │  │                 │  │  UnexpectedResponse │ │
//! │  └─────────────────────┘  └─────────────────┘  └─────────────────────┘ │
//! │                                                                         │
//! │  Retried: transport failures, 429, 5xx, TokenRejected                  │
//! │  Surfaced immediately: everything else                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payment gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid payments configuration.
    #[error("Invalid payments configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load payments config: {0}")]
    ConfigLoadFailed(String),

    /// Client id or app secret not configured.
    #[error("PayPal credentials are not configured")]
    MissingCredentials,

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the provider.
    #[error("Connection to payment provider failed: {0}")]
    ConnectionFailed(String),

    /// A single call exceeded its timeout.
    #[error("Payment provider timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    /// The provider answered with a non-success status.
    #[error("Payment provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The cached access token was refused; a fresh one is fetched on retry.
    #[error("Payment provider rejected the access token")]
    TokenRejected,

    /// The response body did not have the expected shape.
    #[error("Unexpected response from payment provider: {0}")]
    UnexpectedResponse(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(0)
        } else if err.is_decode() {
            GatewayError::UnexpectedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            GatewayError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidConfig(format!("invalid api_url: {}", err))
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::ConfigLoadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::UnexpectedResponse(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl GatewayError {
    /// Returns true if the call may succeed when repeated.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 429 Too Many Requests and 5xx responses
    /// - A rejected token (the next attempt authenticates again)
    ///
    /// ## Non-Retryable Errors
    /// - Configuration and credential errors
    /// - 4xx responses such as an unknown or unapproved remote order
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::ConnectionFailed(_)
            | GatewayError::Timeout(_)
            | GatewayError::TokenRejected => true,
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
