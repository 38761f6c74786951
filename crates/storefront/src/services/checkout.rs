//! Checkout: turning a server cart into an order.

use thiserror::Error;
use tracing::instrument;

use marigold_core::{CurrencyCode, Price, UserId};

use crate::db::{RepositoryError, Stores};
use crate::models::order::{NewOrder, Order, OrderItem};
use crate::services::cart::price_items;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// Lines priced in different currencies.
    #[error("cart mixes currencies")]
    MixedCurrencies,

    /// The cart was modified between pricing and placing the order.
    #[error("cart changed during checkout, please review it and try again")]
    CartChanged,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout and order history.
pub struct CheckoutService<'a> {
    stores: &'a Stores,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// Unit prices are taken from the current product records. The ordered
    /// lines leave the cart in the same transaction that writes the order;
    /// anything added meanwhile stays for next time.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if there is nothing to buy, and
    /// `CheckoutError::CartChanged` if an ordered line changed or was already
    /// checked out by a concurrent request.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn checkout(&self, user_id: UserId) -> Result<Order, CheckoutError> {
        let cart = self
            .stores
            .carts
            .find_cart(user_id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let items = self.stores.carts.cart_items(cart.id).await?;
        let view = price_items(self.stores.products.as_ref(), &items).await?;
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let currency = view
            .lines
            .first()
            .map_or(CurrencyCode::default(), |l| l.unit_price.currency_code);
        let total = view
            .lines
            .iter()
            .try_fold(Price::zero(currency), |acc, line| {
                acc.checked_add(line.line_total)
            })
            .ok_or(CheckoutError::MixedCurrencies)?;

        let order = NewOrder {
            user_id,
            total,
            items: view.lines.iter().map(OrderItem::from).collect(),
        };
        let placed = match self.stores.orders.place_order(cart.id, &order).await {
            Ok(placed) => placed,
            Err(RepositoryError::Conflict(_)) => {
                tracing::info!("cart changed during checkout");
                return Err(CheckoutError::CartChanged);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(order_id = %placed.id, total = %placed.total, "order placed");
        Ok(placed)
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns a `CheckoutError::Repository` if the store fails.
    pub async fn orders(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.stores.orders.orders_for_user(user_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use marigold_core::{CartId, Discount, Email, OrderId, OrderStatus, ProductId, Quantity};

    use super::*;
    use crate::db::{CartStore, MemoryBackend, OrderStore};
    use crate::models::order::SalesSummary;
    use crate::models::product::ProductInput;

    /// Runs `edit` against the cart right before the order is written, the
    /// way a request landing mid-checkout would.
    struct EditBeforePlacing {
        backend: Arc<MemoryBackend>,
        edit: (ProductId, Quantity),
    }

    #[async_trait]
    impl OrderStore for EditBeforePlacing {
        async fn place_order(
            &self,
            cart_id: CartId,
            order: &NewOrder,
        ) -> Result<Order, RepositoryError> {
            let (product_id, quantity) = self.edit;
            self.backend.add_item(cart_id, product_id, quantity).await?;
            self.backend.place_order(cart_id, order).await
        }

        async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
            self.backend.orders_for_user(user_id).await
        }

        async fn list_orders(
            &self,
            status: Option<OrderStatus>,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.backend.list_orders(status).await
        }

        async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
            self.backend.get_order(id).await
        }

        async fn update_status(
            &self,
            id: OrderId,
            from: OrderStatus,
            to: OrderStatus,
        ) -> Result<Order, RepositoryError> {
            self.backend.update_status(id, from, to).await
        }

        async fn sales_summary(
            &self,
            since: Option<DateTime<Utc>>,
        ) -> Result<SalesSummary, RepositoryError> {
            self.backend.sales_summary(since).await
        }
    }

    fn product_input(name: &str, cents: i64) -> ProductInput {
        ProductInput {
            name: name.into(),
            description: String::new(),
            price: Decimal::new(cents, 2),
            discount_percent: None,
            image_url: None,
            active: true,
        }
    }

    /// A cart holding two teas, with `edit` applied mid-checkout.
    async fn racing_checkout(
        edit: impl FnOnce(ProductId, ProductId) -> (ProductId, Quantity),
    ) -> (Stores, UserId, CartId, ProductId, ProductId) {
        let backend = Arc::new(MemoryBackend::new());
        let mut stores = Stores::from_backend(&backend);
        let user = stores
            .users
            .create_with_password(&Email::parse("racer@example.com").unwrap(), "hash")
            .await
            .unwrap();
        let tea = stores.products.create_product(&product_input("Tea", 500)).await.unwrap();
        let mug = stores.products.create_product(&product_input("Mug", 1200)).await.unwrap();
        let cart = stores.carts.get_or_create_cart(user.id).await.unwrap();
        stores
            .carts
            .add_item(cart.id, tea.id, Quantity::new(2).unwrap())
            .await
            .unwrap();

        stores.orders = Arc::new(EditBeforePlacing {
            backend,
            edit: edit(tea.id, mug.id),
        });
        (stores, user.id, cart.id, tea.id, mug.id)
    }

    async fn setup() -> (Stores, UserId) {
        let stores = Stores::memory();
        let user = stores
            .users
            .create_with_password(&Email::parse("buyer@example.com").unwrap(), "hash")
            .await
            .unwrap();
        (stores, user.id)
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let (stores, user_id) = setup().await;
        let service = CheckoutService::new(&stores);
        assert!(matches!(
            service.checkout(user_id).await,
            Err(CheckoutError::EmptyCart)
        ));

        stores.carts.get_or_create_cart(user_id).await.unwrap();
        assert!(matches!(
            service.checkout(user_id).await,
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_checkout_snapshots_current_prices_and_empties_cart() {
        let (stores, user_id) = setup().await;
        let product = stores
            .products
            .create_product(&ProductInput {
                name: "Teapot".into(),
                description: String::new(),
                price: Decimal::new(3000, 2),
                discount_percent: None,
                image_url: None,
                active: true,
            })
            .await
            .unwrap();
        let cart = stores.carts.get_or_create_cart(user_id).await.unwrap();
        stores
            .carts
            .add_item(cart.id, product.id, Quantity::new(2).unwrap())
            .await
            .unwrap();

        stores
            .products
            .update_product(
                product.id,
                &ProductInput {
                    name: "Teapot".into(),
                    description: String::new(),
                    price: Decimal::new(3000, 2),
                    discount_percent: Some(Discount::new(Decimal::new(10, 0)).unwrap()),
                    image_url: None,
                    active: true,
                },
            )
            .await
            .unwrap();

        let service = CheckoutService::new(&stores);
        let order = service.checkout(user_id).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total.amount, Decimal::new(5400, 2));
        assert_eq!(order.items[0].unit_price.amount, Decimal::new(2700, 2));
        assert!(stores.carts.cart_items(cart.id).await.unwrap().is_empty());
        assert_eq!(service.orders(user_id).await.unwrap(), vec![order]);
    }

    #[tokio::test]
    async fn test_line_added_during_checkout_stays_in_cart() {
        let (stores, user_id, cart_id, tea, mug) =
            racing_checkout(|_, mug| (mug, Quantity::new(4).unwrap())).await;

        let order = CheckoutService::new(&stores).checkout(user_id).await.unwrap();

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_id, tea);
        assert_eq!(order.total.amount, Decimal::new(1000, 2));
        let left = stores.carts.cart_items(cart_id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product_id, mug);
        assert_eq!(left[0].quantity, Quantity::new(4).unwrap());
    }

    #[tokio::test]
    async fn test_quantity_bumped_during_checkout_places_nothing() {
        let (stores, user_id, cart_id, tea, _) =
            racing_checkout(|tea, _| (tea, Quantity::ONE)).await;

        let result = CheckoutService::new(&stores).checkout(user_id).await;

        assert!(matches!(result, Err(CheckoutError::CartChanged)));
        assert!(stores.orders.orders_for_user(user_id).await.unwrap().is_empty());
        let left = stores.carts.cart_items(cart_id).await.unwrap();
        assert_eq!(left[0].product_id, tea);
        assert_eq!(left[0].quantity, Quantity::new(3).unwrap());
    }
}
