use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use storefront_core::Product;

use super::found;
use crate::error::ActionResult;
use crate::services::CatalogService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct LatestQuery {
    limit: Option<u32>,
}

pub(super) async fn latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> ActionResult<Vec<Product>> {
    found(CatalogService::new(state).latest_products(query.limit).await)
}

pub(super) async fn by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ActionResult<Product> {
    found(CatalogService::new(state).product_by_slug(&slug).await)
}
