//! Merging an anonymous cart into a user's server cart at sign-in.
//!
//! Each anonymous line is applied with one atomic store call guarded by the
//! line's merge key, so running the same merge twice (a retried login, two
//! tabs signing in at once) never double-counts. Lines are applied strictly
//! in order. The first failure that isn't a missing product stops the merge;
//! that line and every line after it come back as `unmerged` for the caller
//! to keep in the anonymous cart.

use serde::Serialize;
use tracing::instrument;

use marigold_core::{ProductId, UserId};

use super::price_items;
use crate::db::{CartStore, ProductStore, RepositoryError};
use crate::models::cart::{AnonymousItem, CartView, MergeResult};

/// Result of a reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    /// The server cart after the merge, priced from current product data.
    pub cart: CartView,
    /// Lines added to the server cart.
    pub merged: usize,
    /// Lines whose merge key had already been applied.
    pub skipped: usize,
    /// Products that no longer exist.
    pub dropped: Vec<ProductId>,
    /// Lines not yet applied because the merge stopped early.
    pub unmerged: Vec<AnonymousItem>,
    /// Why the merge stopped, if it did.
    pub failure: Option<String>,
}

impl ReconcileOutcome {
    /// Whether every line was either applied or safely discarded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.unmerged.is_empty() && self.failure.is_none()
    }
}

/// Merges anonymous lines into server carts.
pub struct CartReconciler<'a> {
    carts: &'a dyn CartStore,
    products: &'a dyn ProductStore,
}

impl<'a> CartReconciler<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartStore, products: &'a dyn ProductStore) -> Self {
        Self { carts, products }
    }

    /// Merge `items` into the cart of `user_id`.
    ///
    /// Never fails: problems are logged and reported in the outcome.
    #[instrument(skip(self, user_id, items), fields(user_id = %user_id, items = items.len()))]
    pub async fn reconcile(&self, user_id: UserId, items: Vec<AnonymousItem>) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome {
            cart: CartView::empty(),
            merged: 0,
            skipped: 0,
            dropped: Vec::new(),
            unmerged: Vec::new(),
            failure: None,
        };

        let cart = match self.carts.get_or_create_cart(user_id).await {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "could not open server cart, nothing merged");
                outcome.failure = Some(e.to_string());
                outcome.unmerged = items;
                return outcome;
            }
        };

        let mut pending = items.into_iter();
        while let Some(item) = pending.next() {
            let result = self
                .carts
                .merge_item(cart.id, item.product_id, item.quantity, item.merge_key)
                .await;
            match result {
                Ok(MergeResult::Applied) => outcome.merged += 1,
                Ok(MergeResult::AlreadyApplied) => {
                    tracing::debug!(merge_key = %item.merge_key, "line already merged");
                    outcome.skipped += 1;
                }
                Err(RepositoryError::NotFound) => {
                    tracing::info!(product_id = %item.product_id, "dropping line for missing product");
                    outcome.dropped.push(item.product_id);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        product_id = %item.product_id,
                        "merge stopped, keeping remaining lines"
                    );
                    outcome.failure = Some(e.to_string());
                    outcome.unmerged.push(item);
                    outcome.unmerged.extend(pending.by_ref());
                    break;
                }
            }
        }

        match self.carts.cart_items(cart.id).await {
            Ok(server_items) => match price_items(self.products, &server_items).await {
                Ok(view) => outcome.cart = view,
                Err(e) => {
                    tracing::warn!(error = %e, "could not price merged cart");
                    outcome.failure.get_or_insert_with(|| e.to_string());
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read merged cart");
                outcome.failure.get_or_insert_with(|| e.to_string());
            }
        }

        tracing::info!(
            merged = outcome.merged,
            skipped = outcome.skipped,
            dropped = outcome.dropped.len(),
            unmerged = outcome.unmerged.len(),
            "anonymous cart reconciled"
        );
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use marigold_core::{CartId, Discount, Email, Quantity};

    use super::*;
    use crate::db::{MemoryBackend, UserStore};
    use crate::models::cart::{Cart, CartItem};
    use crate::models::product::{Product, ProductInput};

    /// Cart store whose `merge_item` fails from the n-th call on.
    struct FailingCarts {
        inner: Arc<MemoryBackend>,
        fail_from: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CartStore for FailingCarts {
        async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
            self.inner.find_cart(user_id).await
        }

        async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
            self.inner.get_or_create_cart(user_id).await
        }

        async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
            self.inner.cart_items(cart_id).await
        }

        async fn add_item(
            &self,
            cart_id: CartId,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<Quantity, RepositoryError> {
            self.inner.add_item(cart_id, product_id, quantity).await
        }

        async fn set_item_quantity(
            &self,
            cart_id: CartId,
            product_id: ProductId,
            quantity: Quantity,
        ) -> Result<(), RepositoryError> {
            self.inner
                .set_item_quantity(cart_id, product_id, quantity)
                .await
        }

        async fn remove_item(
            &self,
            cart_id: CartId,
            product_id: ProductId,
        ) -> Result<bool, RepositoryError> {
            self.inner.remove_item(cart_id, product_id).await
        }

        async fn merge_item(
            &self,
            cart_id: CartId,
            product_id: ProductId,
            quantity: Quantity,
            merge_key: Uuid,
        ) -> Result<MergeResult, RepositoryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner
                .merge_item(cart_id, product_id, quantity, merge_key)
                .await
        }
    }

    struct Fixture {
        backend: Arc<MemoryBackend>,
        user_id: UserId,
        p1: Product,
        p2: Product,
    }

    impl Fixture {
        async fn new() -> Self {
            let backend = Arc::new(MemoryBackend::new());
            let user = backend
                .create_with_password(&Email::parse("shopper@example.com").unwrap(), "hash")
                .await
                .unwrap();
            let p1 = create(&backend, "Kettle", 4000, None).await;
            let p2 = create(&backend, "Mug", 1200, None).await;
            Self {
                backend,
                user_id: user.id,
                p1,
                p2,
            }
        }

        fn reconciler(&self) -> CartReconciler<'_> {
            CartReconciler::new(self.backend.as_ref(), self.backend.as_ref())
        }

        async fn server_quantity(&self, product: &Product) -> Option<u32> {
            let cart = self.backend.find_cart(self.user_id).await.unwrap()?;
            self.backend
                .cart_items(cart.id)
                .await
                .unwrap()
                .into_iter()
                .find(|i| i.product_id == product.id)
                .map(|i| i.quantity.get())
        }

        async fn seed_server_line(&self, product: &Product, quantity: u32) {
            let cart = self.backend.get_or_create_cart(self.user_id).await.unwrap();
            self.backend
                .add_item(cart.id, product.id, Quantity::new(quantity).unwrap())
                .await
                .unwrap();
        }
    }

    async fn create(
        backend: &MemoryBackend,
        name: &str,
        cents: i64,
        discount: Option<i64>,
    ) -> Product {
        backend
            .create_product(&ProductInput {
                name: name.into(),
                description: String::new(),
                price: Decimal::new(cents, 2),
                discount_percent: discount.map(|d| Discount::new(Decimal::new(d, 0)).unwrap()),
                image_url: None,
                active: true,
            })
            .await
            .unwrap()
    }

    fn line(product: &Product, quantity: u32) -> AnonymousItem {
        AnonymousItem::snapshot(product, Quantity::new(quantity).unwrap())
    }

    #[tokio::test]
    async fn test_union_of_server_and_anonymous_lines() {
        let fx = Fixture::new().await;
        fx.seed_server_line(&fx.p1, 2).await;

        let outcome = fx
            .reconciler()
            .reconcile(fx.user_id, vec![line(&fx.p2, 1)])
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.merged, 1);
        assert_eq!(fx.server_quantity(&fx.p1).await, Some(2));
        assert_eq!(fx.server_quantity(&fx.p2).await, Some(1));
        assert_eq!(outcome.cart.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_matching_lines_sum_quantities() {
        let fx = Fixture::new().await;
        fx.seed_server_line(&fx.p1, 2).await;

        let outcome = fx
            .reconciler()
            .reconcile(fx.user_id, vec![line(&fx.p1, 3)])
            .await;

        assert_eq!(fx.server_quantity(&fx.p1).await, Some(5));
        assert_eq!(outcome.cart.quantity_of(fx.p1.id).map(Quantity::get), Some(5));
    }

    #[tokio::test]
    async fn test_malformed_quantities_merge_as_one() {
        let fx = Fixture::new().await;
        let items: Vec<AnonymousItem> = serde_json::from_value(serde_json::json!([
            {"product_id": fx.p1.id, "quantity": 0},
            {"product_id": fx.p2.id, "quantity": -4},
        ]))
        .unwrap();

        fx.reconciler().reconcile(fx.user_id, items).await;

        assert_eq!(fx.server_quantity(&fx.p1).await, Some(1));
        assert_eq!(fx.server_quantity(&fx.p2).await, Some(1));
    }

    #[tokio::test]
    async fn test_lines_are_priced_from_current_product() {
        let fx = Fixture::new().await;
        let stale = line(&fx.p1, 1);
        assert_eq!(stale.unit_price, Decimal::new(4000, 2));

        fx.backend
            .update_product(
                fx.p1.id,
                &ProductInput {
                    name: fx.p1.name.clone(),
                    description: String::new(),
                    price: Decimal::new(4000, 2),
                    discount_percent: Some(Discount::new(Decimal::new(25, 0)).unwrap()),
                    image_url: None,
                    active: true,
                },
            )
            .await
            .unwrap();

        let outcome = fx.reconciler().reconcile(fx.user_id, vec![stale]).await;
        let priced = &outcome.cart.lines[0];
        assert_eq!(priced.unit_price.amount, Decimal::new(3000, 2));
        assert_eq!(outcome.cart.subtotal.amount, Decimal::new(3000, 2));
    }

    #[tokio::test]
    async fn test_retry_with_same_merge_keys_is_a_no_op() {
        let fx = Fixture::new().await;
        let items = vec![line(&fx.p1, 2), line(&fx.p2, 1)];

        let first = fx.reconciler().reconcile(fx.user_id, items.clone()).await;
        let second = fx.reconciler().reconcile(fx.user_id, items).await;

        assert_eq!(first.merged, 2);
        assert_eq!(second.merged, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(fx.server_quantity(&fx.p1).await, Some(2));
        assert_eq!(fx.server_quantity(&fx.p2).await, Some(1));
    }

    #[tokio::test]
    async fn test_missing_products_are_dropped() {
        let fx = Fixture::new().await;
        let mut ghost = line(&fx.p1, 1);
        ghost.product_id = ProductId::new(9999);

        let outcome = fx
            .reconciler()
            .reconcile(fx.user_id, vec![ghost, line(&fx.p2, 1)])
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.dropped, vec![ProductId::new(9999)]);
        assert_eq!(fx.server_quantity(&fx.p2).await, Some(1));
    }

    #[tokio::test]
    async fn test_failure_returns_failed_and_later_lines() {
        let fx = Fixture::new().await;
        let p3 = create(&fx.backend, "Tray", 800, None).await;
        let carts = FailingCarts {
            inner: fx.backend.clone(),
            fail_from: 1,
            calls: AtomicUsize::new(0),
        };
        let items = vec![line(&fx.p1, 1), line(&fx.p2, 2), line(&p3, 3)];
        let expected_unmerged = items[1..].to_vec();

        let outcome = CartReconciler::new(&carts, fx.backend.as_ref())
            .reconcile(fx.user_id, items.clone())
            .await;

        assert_eq!(outcome.merged, 1);
        assert_eq!(outcome.unmerged, expected_unmerged);
        assert!(outcome.failure.is_some());
        assert_eq!(outcome.cart.lines.len(), 1);

        // Retrying the whole cart once the store recovers applies the rest only.
        let retry = fx.reconciler().reconcile(fx.user_id, items).await;
        assert_eq!(retry.skipped, 1);
        assert_eq!(retry.merged, 2);
        assert_eq!(fx.server_quantity(&fx.p1).await, Some(1));
        assert_eq!(fx.server_quantity(&p3).await, Some(3));
    }

    #[tokio::test]
    async fn test_unknown_user_leaves_everything_unmerged() {
        let fx = Fixture::new().await;
        let items = vec![line(&fx.p1, 1)];

        let outcome = fx
            .reconciler()
            .reconcile(UserId::new(424_242), items.clone())
            .await;

        assert_eq!(outcome.unmerged, items);
        assert!(outcome.cart.is_empty());
    }
}
