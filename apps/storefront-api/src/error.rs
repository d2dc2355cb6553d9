//! # API Error and Action Result
//!
//! Every lifecycle operation answers with the same envelope, success or not.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Storefront API                     │
//! │                                                                         │
//! │  Service method                                                        │
//! │  ApiResult<Outcome<T>>                                                 │
//! │         │                                                               │
//! │         ├── ValidationError ──┐                                        │
//! │         ├── CoreError ────────┤                                        │
//! │         ├── DbError ──────────┼──► ApiError { code, message,           │
//! │         └── GatewayError ─────┘              redirect_to }             │
//! │                                          │                              │
//! │                                          ▼                              │
//! │  ActionResult { success, message, redirectTo?, code?, data? }          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  HTTP response (status from ErrorCode, JSON body)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! ```json
//! {
//!   "success": false,
//!   "message": "Your cart is empty",
//!   "redirectTo": "/cart",
//!   "code": "VALIDATION_ERROR"
//! }
//! ```
//!
//! Storage failures are logged with their detail and reported with a
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use storefront_core::{CoreError, ValidationError};
use storefront_db::DbError;
use storefront_payments::GatewayError;

/// Prefix of every storage or internal failure message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong";

// =============================================================================
// Error Code
// =============================================================================

/// Error codes for API responses.
///
/// ## Usage in Frontend
/// ```typescript
/// const res = await fetch('/api/cart/items', { method: 'POST', body });
/// const result = await res.json();
/// if (!result.success) {
///   switch (result.code) {
///     case 'INSUFFICIENT_STOCK':
///       toast(result.message);
///       break;
///     case 'UNAUTHENTICATED':
///       router.push(result.redirectTo);
///       break;
///   }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed or a checkout precondition is unmet (400)
    ValidationError,

    /// Resource not found or not visible to the caller (404)
    NotFound,

    /// Not enough stock to add another unit (409)
    InsufficientStock,

    /// Captured payment does not match the pending order (409)
    PaymentMismatch,

    /// The order is already paid; nothing changed (409)
    AlreadyPaid,

    /// Delivery requested for an unpaid order (409)
    NotPaid,

    /// Delivery requested twice (409)
    AlreadyDelivered,

    /// The payment provider failed or is unreachable (502)
    PaymentError,

    /// Email or password did not match (401)
    InvalidCredentials,

    /// No session (401)
    Unauthenticated,

    /// Session lacks the role (403)
    Forbidden,

    /// Storage failure (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status carried by a failed [`ActionResult`].
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InsufficientStock
            | ErrorCode::PaymentMismatch
            | ErrorCode::AlreadyPaid
            | ErrorCode::NotPaid
            | ErrorCode::AlreadyDelivered => StatusCode::CONFLICT,
            ErrorCode::PaymentError => StatusCode::BAD_GATEWAY,
            ErrorCode::InvalidCredentials | ErrorCode::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// API Error
// =============================================================================

/// A failed lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Page the UI should navigate to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// Result type for service methods.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            redirect_to: None,
        }
    }

    /// Attaches a redirect hint.
    pub fn redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = Some(path.into());
        self
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::NotFound, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error with the generic message.
    pub fn internal() -> Self {
        ApiError::new(ErrorCode::Internal, GENERIC_FAILURE_MESSAGE)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(_) => ApiError::not_found("Product not found"),
            CoreError::CartNotFound => ApiError::not_found(message),
            CoreError::ItemNotInCart(_) => ApiError::not_found(message),
            CoreError::OrderNotFound(_) => ApiError::not_found("Order not found"),
            CoreError::UserNotFound(_) => ApiError::not_found("User not found"),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, "Not enough stock")
            }
            CoreError::PaymentMismatch { .. } => ApiError::new(ErrorCode::PaymentMismatch, message),
            CoreError::AlreadyPaid(_) => ApiError::new(ErrorCode::AlreadyPaid, "Order is already paid"),
            CoreError::NotPaid(_) => ApiError::new(ErrorCode::NotPaid, "Order is not paid"),
            CoreError::AlreadyDelivered(_) => {
                ApiError::new(ErrorCode::AlreadyDelivered, "Order is already delivered")
            }
            CoreError::Unauthenticated => ApiError::new(ErrorCode::Unauthenticated, message)
                .redirect(storefront_core::access::SIGN_IN_PATH),
            CoreError::Forbidden { .. } => ApiError::new(ErrorCode::Forbidden, message)
                .redirect(storefront_core::access::UNAUTHORIZED_PATH),
            CoreError::QuantityTooLarge { .. } => ApiError::validation(message),
            CoreError::Validation(e) => e.into(),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::not_found(format!("{} not found", entity)),
            DbError::UniqueViolation { field, .. } => {
                ApiError::validation(format!("{} already exists", field_label(&field)))
            }
            DbError::StaleWrite { entity, id } => {
                warn!(entity = %entity, id = %id, "Concurrent modification not resolved");
                ApiError::new(
                    ErrorCode::DatabaseError,
                    "Your cart changed while this request ran, please try again",
                )
            }
            other => {
                error!(error = %other, "Database operation failed");
                ApiError::new(
                    ErrorCode::DatabaseError,
                    format!("{}: {}", GENERIC_FAILURE_MESSAGE, other),
                )
            }
        }
    }
}

/// Converts gateway errors to API errors.
impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Api { status, ref message } if (400..500).contains(&status) => {
                warn!(status, message = %message, "Payment provider refused the request");
                ApiError::new(ErrorCode::PaymentError, format!("Payment was not accepted: {}", message))
            }
            other => {
                error!(error = %other, "Payment provider call failed");
                ApiError::new(
                    ErrorCode::PaymentError,
                    "Payment provider is unavailable, please try again",
                )
            }
        }
    }
}

/// "users.email" -> "Email"
fn field_label(field: &str) -> String {
    let column = field.rsplit('.').next().unwrap_or(field);
    let mut chars = column.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Value".to_string(),
    }
}

// =============================================================================
// Action Result
// =============================================================================

/// What a successful operation reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub message: String,
    pub redirect_to: Option<String>,
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn new(message: impl Into<String>) -> Self {
        Outcome {
            message: message.into(),
            redirect_to: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    pub fn redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = Some(path.into());
        self
    }
}

/// Uniform envelope of every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResult<T> {
    pub fn failure(err: ApiError) -> Self {
        ActionResult {
            success: false,
            message: err.message,
            redirect_to: err.redirect_to,
            code: Some(err.code),
            data: None,
        }
    }
}

impl<T> From<Outcome<T>> for ActionResult<T> {
    fn from(outcome: Outcome<T>) -> Self {
        ActionResult {
            success: true,
            message: outcome.message,
            redirect_to: outcome.redirect_to,
            code: None,
            data: outcome.data,
        }
    }
}

impl<T> From<ApiResult<Outcome<T>>> for ActionResult<T> {
    fn from(result: ApiResult<Outcome<T>>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(err) => ActionResult::failure(err),
        }
    }
}

impl<T: Serialize> IntoResponse for ActionResult<T> {
    fn into_response(self) -> Response {
        let status = self.code.map(|c| c.status()).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ActionResult::<()>::failure(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_email_message() {
        let err: ApiError = DbError::UniqueViolation {
            field: "users.email".into(),
            value: "jane@example.com".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Email already exists");
    }

    #[test]
    fn test_storage_failure_carries_cause() {
        let err: ApiError = DbError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.message, "Something went wrong: Query failed: disk I/O error");

        let err: ApiError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(err.message.starts_with(GENERIC_FAILURE_MESSAGE));
        assert!(err.message.contains("FOREIGN KEY constraint failed"));
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = CoreError::InsufficientStock {
            product: "Polo".into(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.message, "Not enough stock");

        let err: ApiError = CoreError::Forbidden { reason: "admin role required".into() }.into();
        assert_eq!(err.code.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.redirect_to.as_deref(), Some("/unauthorized"));
    }

    #[test]
    fn test_action_result_wire_shape() {
        let failure: ActionResult<()> =
            ApiError::validation("Your cart is empty").redirect("/cart").into_result();
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Your cart is empty");
        assert_eq!(json["redirectTo"], "/cart");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json.get("data").is_none());

        let success: ActionResult<u32> = Outcome::new("done").with_data(7).into();
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 7);
        assert!(json.get("code").is_none());
    }

    impl ApiError {
        fn into_result<T>(self) -> ActionResult<T> {
            ActionResult::failure(self)
        }
    }
}
