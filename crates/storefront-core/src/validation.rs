//! # Validation Module
//!
//! Input schema checks for the storefront.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Storefront UI                                                │
//! │  └── Form hints, immediate feedback                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: storefront-api (Rust)                                        │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: schema checks, run before any lifecycle rule         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (users.email, one cart per owner)                          │
//! │  ├── CHECK (stock >= 0, delivered implies paid)                        │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::validation::{validate_email, validate_password};
//!
//! validate_email("jane@example.com").unwrap();
//! assert!(validate_password("12345").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{CartItem, ShippingAddress};
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum length of every shipping address field.
pub const MIN_ADDRESS_FIELD_LEN: usize = 3;

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Minimum display name length.
pub const MIN_NAME_LEN: usize = 3;

fn require(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn min_len(field: &str, value: &str, min: usize) -> ValidationResult<()> {
    require(field, value)?;
    if value.trim().chars().count() < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a cart item submitted by the UI.
///
/// ## Rules
/// - productId, name, slug and image are required
/// - price must not be negative
/// - qty must be between 1 and [`MAX_ITEM_QUANTITY`]
pub fn validate_cart_item(item: &CartItem) -> ValidationResult<()> {
    require("productId", &item.product_id)?;
    require("name", &item.name)?;
    require("slug", &item.slug)?;
    require("image", &item.image)?;

    if item.price.is_negative() {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    validate_quantity(item.qty)
}

/// Validates a line quantity.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Checkout Validators
// =============================================================================

/// Validates a shipping address. Every field needs at least 3 characters.
pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    min_len("fullName", &address.full_name, MIN_ADDRESS_FIELD_LEN)?;
    min_len("streetAddress", &address.street_address, MIN_ADDRESS_FIELD_LEN)?;
    min_len("city", &address.city, MIN_ADDRESS_FIELD_LEN)?;
    min_len("postalCode", &address.postal_code, MIN_ADDRESS_FIELD_LEN)?;
    min_len("country", &address.country, MIN_ADDRESS_FIELD_LEN)?;
    Ok(())
}

// =============================================================================
// Account Validators
// =============================================================================

/// Validates an email address.
///
/// Only the shape is checked: one `@`, a non-empty local part, and a domain
/// with a dot that neither starts nor ends it.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    require("email", email)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "Invalid email address".to_string(),
    };

    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

pub fn validate_name(name: &str) -> ValidationResult<()> {
    min_len("name", name, MIN_NAME_LEN)
}

/// Validates a sign-up form.
pub fn validate_sign_up(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> ValidationResult<()> {
    validate_name(name)?;
    validate_email(email)?;
    validate_password(password)?;
    if password != confirm_password {
        return Err(ValidationError::Mismatch {
            message: "Passwords don't match".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string (order ids, user ids).
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    require("id", id)?;

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
