use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;

use storefront_core::{Cart, SessionContext};

use super::found;
use crate::error::ActionResult;
use crate::services::CartService;
use crate::AppState;

/// Body of an add-to-cart request. Line details come from the catalog.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddItemBody {
    product_id: String,
}

pub(super) async fn get_cart(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> ActionResult<Option<Cart>> {
    found(CartService::new(state).get_cart(&ctx).await)
}

pub(super) async fn add_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<AddItemBody>,
) -> ActionResult<Cart> {
    CartService::new(state).add_item(&ctx, &body.product_id).await.into()
}

pub(super) async fn remove_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(product_id): Path<String>,
) -> ActionResult<Cart> {
    CartService::new(state).remove_item(&ctx, &product_id).await.into()
}
