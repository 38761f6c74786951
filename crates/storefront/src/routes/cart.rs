//! Cart route handlers.
//!
//! The same endpoints serve both kinds of shopper: anonymous shoppers work on
//! the cart kept in their session, signed-in shoppers on their server cart.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;

use marigold_core::{ProductId, Quantity};

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::cart::CartView;
use crate::models::session::CurrentUser;
use crate::services::cart::{CartError, CartOwner, CartService};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub product_id: ProductId,
    /// Defaults to 1.
    pub quantity: Option<i64>,
}

/// Quantity update request body. Zero removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove-line request body.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub product_id: ProductId,
}

fn owner<'s>(user: Option<&CurrentUser>, session: &'s Session) -> CartOwner<'s> {
    user.map_or(CartOwner::Anonymous(session), |u| CartOwner::User(u.id))
}

/// Show the current cart.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let service = CartService::new(state.stores(), state.catalog());
    Ok(Json(service.view(owner(user.as_ref(), &session)).await?))
}

/// Add a product to the cart.
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(req): Json<AddRequest>,
) -> Result<Json<CartView>> {
    let quantity = match req.quantity {
        Some(q) => Quantity::try_from(q).map_err(CartError::from)?,
        None => Quantity::ONE,
    };
    let service = CartService::new(state.stores(), state.catalog());
    let view = service
        .add(owner(user.as_ref(), &session), req.product_id, quantity)
        .await?;
    Ok(Json(view))
}

/// Set a line's quantity.
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<CartView>> {
    let service = CartService::new(state.stores(), state.catalog());
    let view = service
        .set_quantity(owner(user.as_ref(), &session), req.product_id, req.quantity)
        .await?;
    Ok(Json(view))
}

/// Remove a line from the cart.
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<CartView>> {
    let service = CartService::new(state.stores(), state.catalog());
    let view = service
        .remove(owner(user.as_ref(), &session), req.product_id)
        .await?;
    Ok(Json(view))
}
