use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;

use storefront_core::{PaymentMethod, SessionContext, ShippingAddress};

use crate::error::{ActionResult, ApiResult, Outcome};
use crate::services::account::{AccountService, SignInForm, SignUpForm, SignedIn};
use crate::session::{expired_cookie, session_cookie, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentMethodBody {
    payment_method: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProfileBody {
    name: String,
}

pub(super) async fn sign_up(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(form): Json<SignUpForm>,
) -> Response {
    let result = AccountService::new(state.clone()).sign_up(&ctx, form).await;
    with_session_cookie(&state, result)
}

pub(super) async fn sign_in(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(form): Json<SignInForm>,
) -> Response {
    let result = AccountService::new(state.clone()).sign_in(&ctx, form).await;
    with_session_cookie(&state, result)
}

pub(super) async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Response {
    let outcome = AccountService::new(state).sign_out(&ctx);
    let mut resp = ActionResult::from(outcome).into_response();
    if let Ok(value) = HeaderValue::from_str(&expired_cookie(SESSION_COOKIE)) {
        resp.headers_mut().append(SET_COOKIE, value);
    }
    resp
}

pub(super) async fn update_address(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(address): Json<ShippingAddress>,
) -> ActionResult<ShippingAddress> {
    AccountService::new(state).update_address(&ctx, address).await.into()
}

pub(super) async fn update_payment_method(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<PaymentMethodBody>,
) -> ActionResult<PaymentMethod> {
    AccountService::new(state)
        .update_payment_method(&ctx, &body.payment_method)
        .await
        .into()
}

pub(super) async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<ProfileBody>,
) -> Response {
    let result = AccountService::new(state.clone()).update_profile(&ctx, &body.name).await;
    with_session_cookie(&state, result)
}

/// Sets the `session` cookie when a token was issued.
fn with_session_cookie(state: &AppState, result: ApiResult<Outcome<SignedIn>>) -> Response {
    let cookie = result
        .as_ref()
        .ok()
        .and_then(|outcome| outcome.data.as_ref())
        .map(|signed_in| session_cookie(&signed_in.token, state.sessions.lifetime_secs()));

    let mut resp = ActionResult::from(result).into_response();
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        resp.headers_mut().append(SET_COOKIE, value);
    }
    resp
}
