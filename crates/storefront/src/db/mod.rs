//! Storage ports and their `PostgreSQL` and in-memory adapters.
//!
//! # Schema: `storefront`
//!
//! - `products` - Catalog
//! - `users`, `user_passwords` - Shopper accounts
//! - `admins` - Staff access, keyed by email
//! - `carts`, `cart_items` - One server cart per user
//! - `cart_merge_receipts` - Anonymous lines already merged into a cart
//! - `orders`, `order_items` - Placed orders with price snapshots
//!
//! Sessions are stored by `tower-sessions-sqlx-store` in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p marigold-cli -- migrate
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use marigold_core::{CartId, Email, OrderId, OrderStatus, ProductId, Quantity, UserId};

use crate::models::admin::AdminRecord;
use crate::models::cart::{Cart, CartItem, MergeResult};
use crate::models::order::{NewOrder, Order, SalesSummary};
use crate::models::product::{Product, ProductInput};
use crate::models::user::User;

pub mod admins;
pub mod carts;
pub mod memory;
pub mod orders;
pub mod products;
pub mod users;

pub use admins::AdminRepository;
pub use carts::CartRepository;
pub use memory::MemoryBackend;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub(crate) fn corrupt(what: &str, err: impl std::fmt::Display) -> Self {
        Self::DataCorruption(format!("invalid {what} in database: {err}"))
    }
}

/// Catalog storage.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, newest first. Inactive products only when asked for.
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fetch several products at once. Missing IDs are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError>;

    /// Replace a product's fields. `NotFound` if it does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product. Cart lines referencing it go with it.
    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;
}

/// Server cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Return the user's cart, creating it on first use.
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError>;

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Increment a line, inserting it if absent. Returns the new quantity.
    ///
    /// `NotFound` if the product does not exist.
    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError>;

    /// Set a line's quantity, inserting it if absent.
    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError>;

    /// Remove a line. Returns whether one existed.
    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Merge one anonymous line, at most once per `merge_key`.
    ///
    /// Recording the key and adding the quantity happen atomically: either
    /// both are visible or neither is. `NotFound` if the product does not
    /// exist.
    async fn merge_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        merge_key: Uuid,
    ) -> Result<MergeResult, RepositoryError>;
}

/// Admin records: the source of truth for roles.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_admin(&self, email: &Email) -> Result<Option<AdminRecord>, RepositoryError>;

    async fn list_admins(&self) -> Result<Vec<AdminRecord>, RepositoryError>;

    /// Grant access, or change the owner flag of an existing grant.
    async fn upsert_admin(
        &self,
        email: &Email,
        is_owner: bool,
    ) -> Result<AdminRecord, RepositoryError>;

    /// Revoke access. Returns whether a record existed.
    async fn delete_admin(&self, email: &Email) -> Result<bool, RepositoryError>;
}

/// Shopper accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Conflict` if the email is taken.
    async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// A user together with their password hash.
    ///
    /// `None` if the user doesn't exist or has no password set.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;
}

/// Orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write a `pending` order and remove the ordered lines from its cart,
    /// atomically.
    ///
    /// Fails with `Conflict` if any ordered line is no longer in the cart at
    /// the snapshotted quantity. Lines added since the snapshot stay.
    async fn place_order(&self, cart_id: CartId, order: &NewOrder)
    -> Result<Order, RepositoryError>;

    /// A user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, newest first, optionally with one status.
    async fn list_orders(&self, status: Option<OrderStatus>)
    -> Result<Vec<Order>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Move an order from `from` to `to`.
    ///
    /// `Conflict` if the order is no longer in `from`.
    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    async fn sales_summary(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, RepositoryError>;
}

/// All storage ports, bundled for application state.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub admins: Arc<dyn AdminStore>,
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Stores backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            products: Arc::new(ProductRepository::new(pool.clone())),
            carts: Arc::new(CartRepository::new(pool.clone())),
            admins: Arc::new(AdminRepository::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool.clone())),
        }
    }

    /// Stores backed by a single in-process [`MemoryBackend`].
    #[must_use]
    pub fn memory() -> Self {
        Self::from_backend(&Arc::new(MemoryBackend::new()))
    }

    /// Stores sharing an existing in-memory backend.
    #[must_use]
    pub fn from_backend(backend: &Arc<MemoryBackend>) -> Self {
        Self {
            products: backend.clone(),
            carts: backend.clone(),
            admins: backend.clone(),
            users: backend.clone(),
            orders: backend.clone(),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// Map a foreign key violation to `NotFound`, everything else to `Database`.
pub(crate) fn not_found_on_foreign_key(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(err)
}
