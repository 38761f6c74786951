//! Store administration: products, orders, analytics and staff.
//!
//! Callers are expected to have checked the acting user's role already (see
//! the `RequireStaff`/`RequireOwner` extractors). This service enforces the
//! rules that depend on data: valid order transitions, and owners not
//! locking themselves out.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use marigold_core::{Email, OrderId, OrderStatus, ProductId};

use crate::db::{RepositoryError, Stores};
use crate::models::admin::AdminRecord;
use crate::models::order::{Order, SalesSummary};
use crate::models::product::{Product, ProductInput};
use crate::services::catalog::CatalogService;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Product fields failed validation.
    #[error("invalid product: {0}")]
    InvalidProduct(String),

    /// The order is delivered or cancelled and no longer changes.
    #[error("order {id} is {status} and can no longer change")]
    OrderClosed { id: OrderId, status: OrderStatus },

    /// The order cannot move to the requested status.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// An owner tried to remove or demote themselves.
    #[error("owners cannot revoke their own access")]
    SelfRevocation,

    #[error("no admin record for {0}")]
    AdminNotFound(Email),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Administrative operations.
pub struct AdminService<'a> {
    stores: &'a Stores,
    catalog: &'a CatalogService,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores, catalog: &'a CatalogService) -> Self {
        Self { stores, catalog }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AdminError::InvalidProduct` for a blank name or negative price.
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, AdminError> {
        validate_product(input)?;
        Ok(self.catalog.create_product(input).await?)
    }

    /// # Errors
    ///
    /// Returns `AdminError::ProductNotFound` for an unknown product.
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, AdminError> {
        validate_product(input)?;
        self.catalog
            .update_product(id, input)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AdminError::ProductNotFound(id),
                other => other.into(),
            })
    }

    /// # Errors
    ///
    /// Returns `AdminError::ProductNotFound` for an unknown product.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), AdminError> {
        self.catalog.delete_product(id).await.map_err(|e| match e {
            RepositoryError::NotFound => AdminError::ProductNotFound(id),
            other => other.into(),
        })
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AdminError::Repository` if the store fails.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AdminError> {
        Ok(self.stores.orders.list_orders(status).await?)
    }

    /// # Errors
    ///
    /// Returns `AdminError::OrderNotFound` for an unknown order.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, AdminError> {
        self.stores
            .orders
            .get_order(id)
            .await?
            .ok_or(AdminError::OrderNotFound(id))
    }

    /// Move an order to `next`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::OrderClosed` for delivered or cancelled orders,
    /// and `AdminError::InvalidTransition` if the status machine forbids the
    /// move, including when the order changed concurrently.
    #[instrument(skip(self), fields(order_id = %id, next = %next))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, AdminError> {
        let order = self.get_order(id).await?;
        if order.status.is_terminal() {
            return Err(AdminError::OrderClosed {
                id,
                status: order.status,
            });
        }
        if !order.status.can_transition_to(next) {
            return Err(AdminError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        match self.stores.orders.update_status(id, order.status, next).await {
            Ok(updated) => {
                tracing::info!(from = %order.status, "order status updated");
                Ok(updated)
            }
            Err(RepositoryError::NotFound) => Err(AdminError::OrderNotFound(id)),
            Err(RepositoryError::Conflict(_)) => {
                let current = self.get_order(id).await?.status;
                Err(AdminError::InvalidTransition {
                    from: current,
                    to: next,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sales figures, optionally only for orders since a point in time.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Repository` if the store fails.
    pub async fn sales_summary(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, AdminError> {
        Ok(self.stores.orders.sales_summary(since).await?)
    }

    // =========================================================================
    // Staff (owner only)
    // =========================================================================

    /// # Errors
    ///
    /// Returns `AdminError::Repository` if the store fails.
    pub async fn list_admins(&self) -> Result<Vec<AdminRecord>, AdminError> {
        Ok(self.stores.admins.list_admins().await?)
    }

    /// Grant admin (or owner) access to an email.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::SelfRevocation` if `acting` would demote themselves.
    #[instrument(skip(self, acting), fields(email = %email))]
    pub async fn grant_admin(
        &self,
        acting: &Email,
        email: &Email,
        is_owner: bool,
    ) -> Result<AdminRecord, AdminError> {
        if acting == email && !is_owner {
            return Err(AdminError::SelfRevocation);
        }
        let record = self.stores.admins.upsert_admin(email, is_owner).await?;
        tracing::info!(is_owner, "admin access granted");
        Ok(record)
    }

    /// Revoke an email's admin access.
    ///
    /// Revocation takes effect for that user's sessions when their cached
    /// role expires.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::AdminNotFound` if there was no record.
    #[instrument(skip(self, acting), fields(email = %email))]
    pub async fn revoke_admin(&self, acting: &Email, email: &Email) -> Result<(), AdminError> {
        if acting == email {
            return Err(AdminError::SelfRevocation);
        }
        if !self.stores.admins.delete_admin(email).await? {
            return Err(AdminError::AdminNotFound(email.clone()));
        }
        tracing::info!("admin access revoked");
        Ok(())
    }
}

fn validate_product(input: &ProductInput) -> Result<(), AdminError> {
    if input.name.trim().is_empty() {
        return Err(AdminError::InvalidProduct("name is required".to_owned()));
    }
    if input.price.is_sign_negative() {
        return Err(AdminError::InvalidProduct(
            "price cannot be negative".to_owned(),
        ));
    }
    Ok(())
}
