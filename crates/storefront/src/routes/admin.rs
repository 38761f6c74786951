//! Store administration handlers.
//!
//! Product, order and analytics routes need an admin or owner; managing the
//! admin list needs an owner.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use marigold_core::{Email, OrderId, OrderStatus, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::{RequireOwner, RequireStaff};
use crate::models::admin::AdminRecord;
use crate::models::order::{Order, SalesSummary};
use crate::models::product::{ProductInput, ProductView};
use crate::services::admin::AdminService;
use crate::state::AppState;

fn service(state: &AppState) -> AdminService<'_> {
    AdminService::new(state.stores(), state.catalog())
}

// =============================================================================
// Products
// =============================================================================

pub async fn create_product(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ProductView>)> {
    let product = service(&state).create_product(&input).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

pub async fn update_product(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ProductView>> {
    let product = service(&state).update_product(id, &input).await?;
    Ok(Json(product.into()))
}

pub async fn delete_product(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    service(&state).delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

/// `?status=` filter for the order list.
#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(service(&state).list_orders(filter.status).await?))
}

pub async fn show_order(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(service(&state).get_order(id).await?))
}

/// Status change request body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    RequireStaff { user, .. }: RequireStaff,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = service(&state)
        .update_order_status(id, update.status)
        .await?;
    tracing::info!(order_id = %id, by = %user.email, status = %order.status, "order status changed");
    Ok(Json(order))
}

/// `?since=` window for analytics, as an RFC 3339 timestamp.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub since: Option<DateTime<Utc>>,
}

pub async fn analytics(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<SalesSummary>> {
    Ok(Json(service(&state).sales_summary(query.since).await?))
}

// =============================================================================
// Admins (owner only)
// =============================================================================

/// Grant request body.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub email: Email,
    #[serde(default)]
    pub owner: bool,
}

pub async fn list_admins(
    State(state): State<AppState>,
    _owner: RequireOwner,
) -> Result<Json<Vec<AdminRecord>>> {
    Ok(Json(service(&state).list_admins().await?))
}

pub async fn grant_admin(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Json(req): Json<GrantRequest>,
) -> Result<(StatusCode, Json<AdminRecord>)> {
    let record = service(&state)
        .grant_admin(&owner.email, &req.email, req.owner)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn revoke_admin(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Path(email): Path<String>,
) -> Result<StatusCode> {
    let email = Email::parse(&email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    service(&state).revoke_admin(&owner.email, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}
