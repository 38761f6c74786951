//! Checkout and order history handlers.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::order::Order;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Turn the signed-in user's cart into an order.
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<(StatusCode, Json<Order>)> {
    let order = CheckoutService::new(state.stores()).checkout(user.id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// The signed-in user's orders, newest first.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(CheckoutService::new(state.stores()).orders(user.id).await?))
}
