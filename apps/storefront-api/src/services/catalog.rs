//! Catalog read service.

use std::sync::Arc;

use storefront_core::{CoreError, Product};

use crate::error::ApiResult;
use crate::AppState;

/// Products shown on the home page when no limit is given.
pub const DEFAULT_LATEST_LIMIT: u32 = 4;

/// Catalog service implementation.
pub struct CatalogService {
    state: Arc<AppState>,
}

impl CatalogService {
    /// Create a new catalog service.
    pub fn new(state: Arc<AppState>) -> Self {
        CatalogService { state }
    }

    /// Newest products first.
    pub async fn latest_products(&self, limit: Option<u32>) -> ApiResult<Vec<Product>> {
        let limit = limit.unwrap_or(DEFAULT_LATEST_LIMIT).clamp(1, 50);
        Ok(self.state.db.products().list_latest(limit).await?)
    }

    pub async fn product_by_slug(&self, slug: &str) -> ApiResult<Product> {
        self.state
            .db
            .products()
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(slug.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::test_support::{product, state};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_latest_products_newest_first() {
        let state = state().await;
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let mut p = product(id, 1000, 5);
            p.created_at = Utc::now() - Duration::minutes(10 - i as i64);
            state.db.products().insert(&p).await.unwrap();
        }

        let service = CatalogService::new(state);
        let latest = service.latest_products(None).await.unwrap();
        let ids: Vec<&str> = latest.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "d", "c", "b"]);

        assert_eq!(service.latest_products(Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_product_by_slug() {
        let state = state().await;
        state.db.products().insert(&product("p1", 1000, 5)).await.unwrap();
        let service = CatalogService::new(state);

        assert_eq!(service.product_by_slug("product-p1").await.unwrap().id, "p1");
        let err = service.product_by_slug("nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
