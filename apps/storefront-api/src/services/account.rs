//! Account service implementation.
//!
//! Sign-up, sign-in and the checkout profile (address, payment method, name).
//! Every successful sign-in hands the session's guest cart to the user.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use storefront_core::validation::{
    validate_email, validate_name, validate_password, validate_shipping_address, validate_sign_up,
};
use storefront_core::{CoreError, PaymentMethod, Session, SessionContext, ShippingAddress, User};

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult, ErrorCode, Outcome};
use crate::services::CartService;
use crate::AppState;

/// Message for any credential failure; does not reveal which part failed.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Sign-in form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    /// Session token, also set as the `session` cookie.
    pub token: String,
    pub user: Session,
}

/// Account service implementation.
pub struct AccountService {
    state: Arc<AppState>,
}

impl AccountService {
    /// Create a new account service.
    pub fn new(state: Arc<AppState>) -> Self {
        AccountService { state }
    }

    /// Registers a user, signs them in and hands over the guest cart.
    pub async fn sign_up(&self, ctx: &SessionContext, form: SignUpForm) -> ApiResult<Outcome<SignedIn>> {
        validate_sign_up(&form.name, &form.email, &form.password, &form.confirm_password)?;

        let hash = hash_password(&form.password)?;
        let user = User::new(form.name.trim(), form.email.trim().to_lowercase(), hash);

        self.state.db.users().insert(&user).await?;
        info!(user_id = %user.id, "User registered");

        let signed_in = self.start_session(ctx, &user).await?;
        Ok(Outcome::new("User created successfully").with_data(signed_in))
    }

    /// Verifies credentials, signs the user in and hands over the guest cart.
    pub async fn sign_in(&self, ctx: &SessionContext, form: SignInForm) -> ApiResult<Outcome<SignedIn>> {
        validate_email(&form.email)?;
        validate_password(&form.password)?;

        let user = self.state.db.users().get_by_email(&form.email).await?;

        let verified = user.filter(|u| {
            u.password_hash
                .as_deref()
                .is_some_and(|hash| verify_password(&form.password, hash))
        });

        let Some(user) = verified else {
            warn!("Rejected sign-in attempt");
            return Err(ApiError::new(ErrorCode::InvalidCredentials, INVALID_CREDENTIALS_MESSAGE));
        };

        let signed_in = self.start_session(ctx, &user).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(Outcome::new("Signed in successfully").with_data(signed_in))
    }

    /// Ends the session. The router clears the session cookie.
    pub fn sign_out(&self, ctx: &SessionContext) -> Outcome<()> {
        if let Some(user_id) = ctx.user_id() {
            info!(user_id = %user_id, "User signed out");
        }
        Outcome::new("Signed out successfully").redirect("/")
    }

    /// Saves the shipping address used by the next checkout.
    pub async fn update_address(&self, ctx: &SessionContext, address: ShippingAddress) -> ApiResult<Outcome<ShippingAddress>> {
        let session = ctx.require_user()?;
        validate_shipping_address(&address)?;

        self.state.db.users().update_address(&session.user_id, &address).await?;

        Ok(Outcome::new("User updated successfully")
            .redirect("/payment-method")
            .with_data(address))
    }

    /// Selects the payment method used by the next checkout.
    pub async fn update_payment_method(&self, ctx: &SessionContext, method: &str) -> ApiResult<Outcome<PaymentMethod>> {
        let session = ctx.require_user()?;
        let method: PaymentMethod = method.parse()?;

        self.state.db.users().update_payment_method(&session.user_id, method).await?;

        Ok(Outcome::new("User updated successfully")
            .redirect("/place-order")
            .with_data(method))
    }

    /// Renames the user and reissues the session token with the new name.
    pub async fn update_profile(&self, ctx: &SessionContext, name: &str) -> ApiResult<Outcome<SignedIn>> {
        let session = ctx.require_user()?;
        validate_name(name)?;

        let users = self.state.db.users();
        users.update_name(&session.user_id, name.trim()).await?;

        let user = users
            .get_by_id(&session.user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(session.user_id.clone()))?;

        let token = self.state.sessions.issue(&user)?;
        Ok(Outcome::new("User updated successfully").with_data(SignedIn {
            token,
            user: session_of(&user),
        }))
    }

    async fn start_session(&self, ctx: &SessionContext, user: &User) -> ApiResult<SignedIn> {
        let token = self.state.sessions.issue(user)?;

        CartService::new(self.state.clone())
            .merge_on_sign_in(&ctx.session_cart_id, &user.id)
            .await?;

        Ok(SignedIn {
            token,
            user: session_of(user),
        })
    }
}

fn session_of(user: &User) -> Session {
    Session {
        user_id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{address, product, state};
    use storefront_core::OwnerKey;

    fn sign_up_form(email: &str) -> SignUpForm {
        SignUpForm {
            name: "Jane Doe".into(),
            email: email.into(),
            password: "secret123".into(),
            confirm_password: "secret123".into(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let state = state().await;
        let service = AccountService::new(state.clone());
        let guest = SessionContext::guest("guest-1");

        let outcome = service.sign_up(&guest, sign_up_form("Jane@Example.com")).await.unwrap();
        assert_eq!(outcome.message, "User created successfully");
        let signed_in = outcome.data.unwrap();
        assert_eq!(signed_in.user.email, "jane@example.com");

        let session = state.sessions.validate(&signed_in.token).unwrap();
        assert_eq!(session, signed_in.user);

        let outcome = service
            .sign_in(&guest, SignInForm { email: "jane@example.com".into(), password: "secret123".into() })
            .await
            .unwrap();
        assert_eq!(outcome.message, "Signed in successfully");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let state = state().await;
        let service = AccountService::new(state);
        let guest = SessionContext::guest("guest-1");

        service.sign_up(&guest, sign_up_form("jane@example.com")).await.unwrap();
        let err = service.sign_up(&guest, sign_up_form("jane@example.com")).await.unwrap_err();
        assert_eq!(err.message, "Email already exists");
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let service = AccountService::new(state().await);
        let guest = SessionContext::guest("guest-1");

        let mut form = sign_up_form("jane@example.com");
        form.confirm_password = "different".into();
        let err = service.sign_up(&guest, form).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Passwords don't match");

        let mut form = sign_up_form("not-an-email");
        form.name = "Jane".into();
        assert!(service.sign_up(&guest, form).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let state = state().await;
        let service = AccountService::new(state);
        let guest = SessionContext::guest("guest-1");
        service.sign_up(&guest, sign_up_form("jane@example.com")).await.unwrap();

        for (email, password) in [("jane@example.com", "wrong-pass"), ("nobody@example.com", "secret123")] {
            let err = service
                .sign_in(&guest, SignInForm { email: email.into(), password: password.into() })
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidCredentials);
            assert_eq!(err.message, INVALID_CREDENTIALS_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_sign_in_takes_over_guest_cart() {
        let state = state().await;
        state.db.products().insert(&product("p1", 2500, 10)).await.unwrap();
        let service = AccountService::new(state.clone());

        service.sign_up(&SessionContext::guest("first-visit"), sign_up_form("jane@example.com")).await.unwrap();

        let guest = SessionContext::guest("second-visit");
        CartService::new(state.clone()).add_item(&guest, "p1").await.unwrap();

        let signed_in = service
            .sign_in(&guest, SignInForm { email: "jane@example.com".into(), password: "secret123".into() })
            .await
            .unwrap()
            .data
            .unwrap();

        let cart = state
            .db
            .carts()
            .find_by_owner(&OwnerKey::User(signed_in.user.user_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_profile_updates() {
        let state = state().await;
        let service = AccountService::new(state.clone());
        let signed_in = service
            .sign_up(&SessionContext::guest("g"), sign_up_form("jane@example.com"))
            .await
            .unwrap()
            .data
            .unwrap();
        let ctx = SessionContext::signed_in(signed_in.user.clone(), "g");

        let outcome = service.update_address(&ctx, address()).await.unwrap();
        assert_eq!(outcome.redirect_to.as_deref(), Some("/payment-method"));

        let outcome = service.update_payment_method(&ctx, "cashondelivery").await.unwrap();
        assert_eq!(outcome.data, Some(PaymentMethod::CashOnDelivery));
        assert!(service.update_payment_method(&ctx, "Bitcoin").await.is_err());

        let renamed = service.update_profile(&ctx, "Jane Smith").await.unwrap().data.unwrap();
        assert_eq!(renamed.user.name, "Jane Smith");

        let user = state.db.users().get_by_id(&signed_in.user.user_id).await.unwrap().unwrap();
        assert_eq!(user.address, Some(address()));
        assert_eq!(user.payment_method, Some(PaymentMethod::CashOnDelivery));
        assert_eq!(user.name, "Jane Smith");

        let mut bad = address();
        bad.city = "X".into();
        let err = service.update_address(&ctx, bad).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service.update_profile(&SessionContext::guest("g"), "Jane").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }
}
