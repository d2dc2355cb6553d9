//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Lifecycle rule violations                      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors                                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  storefront-payments errors                                            │
//! │  └── GatewayError     - Payment network failures                       │
//! │                                                                         │
//! │  storefront-api errors                                                 │
//! │  └── ApiError         - What the UI sees (ActionResult)                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → ActionResult → UI      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Lifecycle errors.
///
/// Each variant maps to one entry of the public error taxonomy
/// (NotFound, InsufficientStock, PaymentMismatch, AlreadyPaid, NotPaid, ...).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// No cart exists for the session or user.
    #[error("Cart not found")]
    CartNotFound,

    /// The cart has no line for the product.
    #[error("Item not found")]
    ItemNotInCart(String),

    /// Order does not exist (or is not visible to the caller).
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// User does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Not enough stock to add one more unit to the cart.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (already 1 in cart)
    ///      │
    ///      ▼
    /// Check stock: product.stock = 1 < 1 + 1
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Polo Shirt", available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// UI shows: "Not enough stock"
    /// ```
    #[error("Not enough stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// The captured payment does not match the pending order.
    ///
    /// ## When This Occurs
    /// - Captured remote order id differs from the stored provisional id
    /// - Capture status is anything other than `COMPLETED`
    /// - No payment was initiated for the order
    #[error("Payment mismatch: {reason}")]
    PaymentMismatch { reason: String },

    /// The order is already paid. Reported explicitly, applied as a no-op.
    #[error("Order {0} is already paid")]
    AlreadyPaid(String),

    /// Delivery requires a paid order.
    #[error("Order {0} is not paid")]
    NotPaid(String),

    /// The order is already delivered.
    #[error("Order {0} is already delivered")]
    AlreadyDelivered(String),

    /// The operation needs a signed-in user.
    #[error("You must be signed in")]
    Unauthenticated,

    /// The signed-in user lacks the required role.
    #[error("Not authorized: {reason}")]
    Forbidden { reason: String },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for schema checks before any lifecycle rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid price).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields that must agree do not.
    #[error("{message}")]
    Mismatch { message: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Polo Shirt".to_string(),
            available: 1,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Not enough stock for Polo Shirt: available 1, requested 2"
        );

        assert_eq!(CoreError::CartNotFound.to_string(), "Cart not found");
        assert_eq!(
            CoreError::ItemNotInCart("p-1".into()).to_string(),
            "Item not found"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "productId".to_string(),
        };
        assert_eq!(err.to_string(), "productId is required");

        let err = ValidationError::TooShort {
            field: "name".to_string(),
            min: 3,
        };
        assert_eq!(err.to_string(), "name must be at least 3 characters");

        let err = ValidationError::Mismatch {
            message: "Passwords don't match".to_string(),
        };
        assert_eq!(err.to_string(), "Passwords don't match");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "slug".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
