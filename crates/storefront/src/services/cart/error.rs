//! Cart error types.

use thiserror::Error;

use marigold_core::ProductId;

use crate::db::RepositoryError;
use crate::storage::StorageError;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product exists but is not for sale.
    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    /// Quantity outside the accepted range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] marigold_core::QuantityError),

    /// Session storage failed.
    #[error("session storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
