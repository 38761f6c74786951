//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use marigold_core::ProductId;

use crate::error::{AppError, Result};
use crate::models::product::ProductView;
use crate::state::AppState;

/// Active products, newest first.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<ProductView>>> {
    let products = state.catalog().list_products().await?;
    Ok(Json(
        products.iter().cloned().map(ProductView::from).collect(),
    ))
}

/// One active product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductView>> {
    state
        .catalog()
        .get_active_product(id)
        .await?
        .map(|product| Json(ProductView::from(product)))
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
