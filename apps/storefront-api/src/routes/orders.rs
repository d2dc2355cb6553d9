use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use storefront_core::{Order, SessionContext};

use super::found;
use crate::error::ActionResult;
use crate::services::{OrderService, PaymentService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<u32>,
}

/// Body of a capture request: the remote order the buyer approved.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CaptureBody {
    remote_order_id: String,
}

pub(super) async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> ActionResult<String> {
    OrderService::new(state).create_order(&ctx).await.into()
}

pub(super) async fn my_orders(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Query(query): Query<HistoryQuery>,
) -> ActionResult<Vec<Order>> {
    found(OrderService::new(state).my_orders(&ctx, query.limit).await)
}

pub(super) async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ActionResult<Order> {
    found(OrderService::new(state).get_order(&ctx, &id).await)
}

pub(super) async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ActionResult<String> {
    PaymentService::new(state).initiate_payment(&ctx, &id).await.into()
}

pub(super) async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<CaptureBody>,
) -> ActionResult<Order> {
    PaymentService::new(state)
        .confirm_payment(&ctx, &id, &body.remote_order_id)
        .await
        .into()
}

pub(super) async fn mark_paid(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ActionResult<Order> {
    PaymentService::new(state).mark_paid_manually(&ctx, &id).await.into()
}

pub(super) async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ActionResult<Order> {
    PaymentService::new(state).mark_delivered(&ctx, &id).await.into()
}
