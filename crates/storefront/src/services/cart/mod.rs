//! Cart service.
//!
//! A shopper who has not signed in keeps an [`anonymous::AnonymousCart`] in
//! their session; a signed-in shopper has a server cart. [`CartService`]
//! offers the same operations over either, and hands sign-in over to the
//! [`reconcile::CartReconciler`].

pub mod anonymous;
mod error;
pub mod reconcile;

pub use anonymous::AnonymousCart;
pub use error::CartError;
pub use reconcile::{CartReconciler, ReconcileOutcome};

use tracing::instrument;

use marigold_core::{ProductId, Quantity, UserId};

use crate::db::{ProductStore, RepositoryError, Stores};
use crate::models::cart::{CartItem, CartLine, CartView};
use crate::models::product::Product;
use crate::services::catalog::CatalogService;
use crate::storage::KeyValueStore;

/// Whose cart an operation applies to.
#[derive(Clone, Copy)]
pub enum CartOwner<'s> {
    /// Not signed in; the cart lives in this client storage.
    Anonymous(&'s dyn KeyValueStore),
    /// Signed in; the cart lives in the database.
    User(UserId),
}

/// Price server cart lines from current product records.
///
/// Lines whose product has been deleted are left out.
pub(crate) async fn price_items(
    products: &dyn ProductStore,
    items: &[CartItem],
) -> Result<CartView, RepositoryError> {
    let ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    let found = products.get_products(&ids).await?;

    let lines = items
        .iter()
        .filter_map(|item| {
            found
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|product| CartLine::priced(product, item.quantity))
        })
        .collect();
    Ok(CartView::from_lines(lines))
}

/// Cart operations for anonymous and signed-in shoppers.
pub struct CartService<'a> {
    stores: &'a Stores,
    catalog: &'a CatalogService,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores, catalog: &'a CatalogService) -> Self {
        Self { stores, catalog }
    }

    /// The current cart.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if storage fails.
    pub async fn view(&self, owner: CartOwner<'_>) -> Result<CartView, CartError> {
        match owner {
            CartOwner::Anonymous(storage) => {
                Ok(anonymous::view(&AnonymousCart::new(storage).load().await?))
            }
            CartOwner::User(user_id) => {
                let Some(cart) = self.stores.carts.find_cart(user_id).await? else {
                    return Ok(CartView::empty());
                };
                let items = self.stores.carts.cart_items(cart.id).await?;
                Ok(price_items(self.stores.products.as_ref(), &items).await?)
            }
        }
    }

    /// Add a product, summing onto an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` or `CartError::ProductUnavailable`
    /// if the product can't be bought.
    #[instrument(skip(self, owner), fields(product_id = %product_id))]
    pub async fn add(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartView, CartError> {
        let product = self.purchasable(product_id).await?;
        match owner {
            CartOwner::Anonymous(storage) => {
                let items = AnonymousCart::new(storage).add(&product, quantity).await?;
                Ok(anonymous::view(&items))
            }
            CartOwner::User(user_id) => {
                let cart = self.stores.carts.get_or_create_cart(user_id).await?;
                self.stores
                    .carts
                    .add_item(cart.id, product_id, quantity)
                    .await
                    .map_err(|e| not_found_as_product(e, product_id))?;
                self.view(owner).await
            }
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a negative quantity.
    #[instrument(skip(self, owner), fields(product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        if quantity == 0 {
            return self.remove(owner, product_id).await;
        }
        let quantity = Quantity::try_from(quantity)?;

        match owner {
            CartOwner::Anonymous(storage) => {
                let items = AnonymousCart::new(storage)
                    .set_quantity(product_id, Some(quantity))
                    .await?;
                Ok(anonymous::view(&items))
            }
            CartOwner::User(user_id) => {
                self.purchasable(product_id).await?;
                let cart = self.stores.carts.get_or_create_cart(user_id).await?;
                self.stores
                    .carts
                    .set_item_quantity(cart.id, product_id, quantity)
                    .await
                    .map_err(|e| not_found_as_product(e, product_id))?;
                self.view(owner).await
            }
        }
    }

    /// Remove a line if present.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if storage fails.
    pub async fn remove(
        &self,
        owner: CartOwner<'_>,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        match owner {
            CartOwner::Anonymous(storage) => {
                let items = AnonymousCart::new(storage).remove(product_id).await?;
                Ok(anonymous::view(&items))
            }
            CartOwner::User(user_id) => {
                if let Some(cart) = self.stores.carts.find_cart(user_id).await? {
                    self.stores.carts.remove_item(cart.id, product_id).await?;
                }
                self.view(owner).await
            }
        }
    }

    /// Move the anonymous cart in `storage` into the user's server cart.
    ///
    /// Lines that could not be merged stay in the anonymous cart; it is
    /// removed once everything has been merged.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the session cannot be read or written.
    /// Merge failures are reported in the outcome instead.
    pub async fn reconcile_session(
        &self,
        storage: &dyn KeyValueStore,
        user_id: UserId,
    ) -> Result<ReconcileOutcome, CartError> {
        let anonymous = AnonymousCart::new(storage);
        let items = anonymous.load().await?;

        let outcome = CartReconciler::new(
            self.stores.carts.as_ref(),
            self.stores.products.as_ref(),
        )
        .reconcile(user_id, items)
        .await;

        anonymous.save(&outcome.unmerged).await?;
        Ok(outcome)
    }

    async fn purchasable(&self, product_id: ProductId) -> Result<Product, CartError> {
        match self.catalog.get_product(product_id).await? {
            Some(product) if product.active => Ok(product),
            Some(_) => Err(CartError::ProductUnavailable(product_id)),
            None => Err(CartError::ProductNotFound(product_id)),
        }
    }
}

fn not_found_as_product(err: RepositoryError, product_id: ProductId) -> CartError {
    match err {
        RepositoryError::NotFound => CartError::ProductNotFound(product_id),
        other => CartError::Repository(other),
    }
}
