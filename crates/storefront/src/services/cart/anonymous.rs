//! The cart of a shopper who has not signed in.
//!
//! Lines live in the client's session as a JSON array. The data is
//! client-scoped and may be stale or malformed: each entry is decoded on its
//! own, bad quantities are floored to one, and entries that can't be decoded
//! at all are dropped with a warning instead of failing the whole cart.

use serde_json::Value;

use marigold_core::{ProductId, Quantity};

use crate::models::cart::{AnonymousItem, CartLine, CartView};
use crate::models::product::Product;
use crate::models::session::keys;
use crate::storage::{KeyValueStore, StorageError, save_json};

/// Anonymous cart over one client's storage.
pub struct AnonymousCart<'a> {
    storage: &'a dyn KeyValueStore,
}

impl<'a> AnonymousCart<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn KeyValueStore) -> Self {
        Self { storage }
    }

    /// Read all decodable lines.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be read.
    pub async fn load(&self) -> Result<Vec<AnonymousItem>, StorageError> {
        let Some(value) = self.storage.load(keys::ANONYMOUS_CART).await? else {
            return Ok(Vec::new());
        };
        let Value::Array(entries) = value else {
            tracing::warn!("anonymous cart is not a list, ignoring it");
            return Ok(Vec::new());
        };

        let items = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<AnonymousItem>(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed anonymous cart entry");
                    None
                }
            })
            .collect();
        Ok(items)
    }

    /// Replace the stored lines. An empty list removes the cart.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be written.
    pub async fn save(&self, items: &[AnonymousItem]) -> Result<(), StorageError> {
        if items.is_empty() {
            return self.clear().await;
        }
        save_json(self.storage, keys::ANONYMOUS_CART, items).await
    }

    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.delete(keys::ANONYMOUS_CART).await
    }

    /// Add a product, summing onto an existing line.
    ///
    /// An existing line keeps its merge key; its price snapshot is refreshed.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be read or written.
    pub async fn add(
        &self,
        product: &Product,
        quantity: Quantity,
    ) -> Result<Vec<AnonymousItem>, StorageError> {
        let mut items = self.load().await?;
        if let Some(line) = items.iter_mut().find(|i| i.product_id == product.id) {
            let merge_key = line.merge_key;
            *line = AnonymousItem {
                merge_key,
                ..AnonymousItem::snapshot(product, line.quantity.saturating_add(quantity))
            };
        } else {
            items.push(AnonymousItem::snapshot(product, quantity));
        }
        self.save(&items).await?;
        Ok(items)
    }

    /// Set a line's quantity; `None` removes it. Unknown products are ignored.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be read or written.
    pub async fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: Option<Quantity>,
    ) -> Result<Vec<AnonymousItem>, StorageError> {
        let mut items = self.load().await?;
        match quantity {
            Some(quantity) => {
                if let Some(line) = items.iter_mut().find(|i| i.product_id == product_id) {
                    line.quantity = quantity;
                }
            }
            None => items.retain(|i| i.product_id != product_id),
        }
        self.save(&items).await?;
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns a `StorageError` if the session cannot be read or written.
    pub async fn remove(&self, product_id: ProductId) -> Result<Vec<AnonymousItem>, StorageError> {
        self.set_quantity(product_id, None).await
    }
}

/// Display view of anonymous lines, using their price snapshots.
#[must_use]
pub fn view(items: &[AnonymousItem]) -> CartView {
    CartView::from_lines(items.iter().map(CartLine::from_snapshot).collect())
}
