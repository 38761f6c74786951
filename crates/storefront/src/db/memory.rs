//! In-process storage backend.
//!
//! Implements every storage port over plain collections behind one async
//! mutex, so each call is atomic with respect to every other call. Used by
//! tests and by local runs without a database.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use marigold_core::{CartId, Email, OrderId, OrderStatus, Price, ProductId, Quantity, UserId};

use super::{AdminStore, CartStore, OrderStore, ProductStore, RepositoryError, UserStore};
use crate::models::admin::AdminRecord;
use crate::models::cart::{Cart, CartItem, MergeResult};
use crate::models::order::{NewOrder, Order, SalesSummary};
use crate::models::product::{Product, ProductInput};
use crate::models::user::User;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    products: BTreeMap<ProductId, Product>,
    users: BTreeMap<UserId, (User, String)>,
    admins: BTreeMap<Email, AdminRecord>,
    carts: HashMap<UserId, Cart>,
    // Insertion order per cart is kept for stable listings.
    cart_items: HashMap<CartId, Vec<CartItem>>,
    receipts: HashSet<(CartId, Uuid)>,
    orders: BTreeMap<OrderId, Order>,
}

impl State {
    const fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product_row(&self, id: ProductId, input: &ProductInput, now: DateTime<Utc>) -> Product {
        let created_at = self.products.get(&id).map_or(now, |p| p.created_at);
        Product {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            price: Price::usd(input.price),
            discount: input.discount_percent,
            image_url: input.image_url.clone(),
            active: input.active,
            created_at,
            updated_at: now,
        }
    }

    fn require_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        if self.products.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn upsert_line(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        update: impl FnOnce(Option<Quantity>) -> Quantity,
    ) -> Quantity {
        let lines = self.cart_items.entry(cart_id).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = update(Some(line.quantity));
            line.quantity
        } else {
            let quantity = update(None);
            lines.push(CartItem {
                product_id,
                quantity,
            });
            quantity
        }
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    orders
}

/// Storage held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryBackend {
    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let id = ProductId::new(state.next_id());
        let product = state.product_row(id, input, Utc::now());
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        state.require_product(id)?;
        let product = state.product_row(id, input, Utc::now());
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .products
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;
        for lines in state.cart_items.values_mut() {
            lines.retain(|l| l.product_id != id);
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryBackend {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.state.lock().await.carts.get(&user_id).copied())
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.get(&user_id) {
            return Ok(*cart);
        }
        if !state.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound);
        }
        let cart = Cart {
            id: CartId::new(state.next_id()),
            user_id,
        };
        state.carts.insert(user_id, cart);
        Ok(cart)
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.cart_items.get(&cart_id).cloned().unwrap_or_default())
    }

    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError> {
        let mut state = self.state.lock().await;
        state.require_product(product_id)?;
        Ok(state.upsert_line(cart_id, product_id, |existing| {
            existing.map_or(quantity, |q| q.saturating_add(quantity))
        }))
    }

    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.require_product(product_id)?;
        state.upsert_line(cart_id, product_id, |_| quantity);
        Ok(())
    }

    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(lines) = state.cart_items.get_mut(&cart_id) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() < before)
    }

    async fn merge_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        merge_key: Uuid,
    ) -> Result<MergeResult, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.receipts.contains(&(cart_id, merge_key)) {
            return Ok(MergeResult::AlreadyApplied);
        }
        state.require_product(product_id)?;
        state.receipts.insert((cart_id, merge_key));
        state.upsert_line(cart_id, product_id, |existing| {
            existing.map_or(quantity, |q| q.saturating_add(quantity))
        });
        Ok(MergeResult::Applied)
    }
}

#[async_trait]
impl AdminStore for MemoryBackend {
    async fn find_admin(&self, email: &Email) -> Result<Option<AdminRecord>, RepositoryError> {
        Ok(self.state.lock().await.admins.get(email).cloned())
    }

    async fn list_admins(&self) -> Result<Vec<AdminRecord>, RepositoryError> {
        let state = self.state.lock().await;
        let mut admins: Vec<AdminRecord> = state.admins.values().cloned().collect();
        admins.sort_by(|a, b| b.is_owner.cmp(&a.is_owner).then(a.email.cmp(&b.email)));
        Ok(admins)
    }

    async fn upsert_admin(
        &self,
        email: &Email,
        is_owner: bool,
    ) -> Result<AdminRecord, RepositoryError> {
        let mut state = self.state.lock().await;
        let record = state
            .admins
            .entry(email.clone())
            .and_modify(|r| r.is_owner = is_owner)
            .or_insert_with(|| AdminRecord {
                email: email.clone(),
                is_owner,
                created_at: Utc::now(),
            });
        Ok(record.clone())
    }

    async fn delete_admin(&self, email: &Email) -> Result<bool, RepositoryError> {
        Ok(self.state.lock().await.admins.remove(email).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryBackend {
    async fn create_with_password(
        &self,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|(u, _)| &u.email == email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(state.next_id()),
            email: email.clone(),
            created_at: now,
            updated_at: now,
        };
        state
            .users
            .insert(user.id, (user.clone(), password_hash.to_owned()));
        Ok(user)
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(u, _)| &u.email == email)
            .map(|(u, _)| u.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|(u, _)| &u.email == email)
            .cloned())
    }
}

#[async_trait]
impl OrderStore for MemoryBackend {
    async fn place_order(
        &self,
        cart_id: CartId,
        order: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let lines = state.cart_items.get(&cart_id).map_or(&[][..], Vec::as_slice);
        let unchanged = order.items.iter().all(|item| {
            lines
                .iter()
                .any(|l| l.product_id == item.product_id && l.quantity == item.quantity)
        });
        if !unchanged {
            return Err(RepositoryError::Conflict(
                "cart changed during checkout".into(),
            ));
        }

        let now = Utc::now();
        let placed = Order {
            id: OrderId::new(state.next_id()),
            user_id: order.user_id,
            status: OrderStatus::Pending,
            total: order.total,
            items: order.items.clone(),
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(placed.id, placed.clone());
        if let Some(lines) = state.cart_items.get_mut(&cart_id) {
            lines.retain(|l| !order.items.iter().any(|i| i.product_id == l.product_id));
        }
        Ok(placed)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .orders
                .values()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .orders
                .values()
                .filter(|o| status.is_none_or(|s| o.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {id} is {}, not {from}",
                order.status
            )));
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn sales_summary(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, RepositoryError> {
        let state = self.state.lock().await;
        Ok(SalesSummary::from_orders(state.orders.values(), since))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::order::OrderItem;

    fn input(name: &str) -> ProductInput {
        ProductInput {
            name: name.into(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            discount_percent: None,
            image_url: None,
            active: true,
        }
    }

    async fn user_with_cart(backend: &MemoryBackend) -> Cart {
        let email = Email::parse("shopper@example.com").unwrap();
        let user = backend.create_with_password(&email, "hash").await.unwrap();
        backend.get_or_create_cart(user.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_merge_item_applies_once_per_key() {
        let backend = MemoryBackend::new();
        let product = backend.create_product(&input("Tea")).await.unwrap();
        let cart = user_with_cart(&backend).await;
        let key = Uuid::new_v4();
        let two = Quantity::new(2).unwrap();

        let first = backend.merge_item(cart.id, product.id, two, key).await.unwrap();
        let second = backend.merge_item(cart.id, product.id, two, key).await.unwrap();

        assert_eq!(first, MergeResult::Applied);
        assert_eq!(second, MergeResult::AlreadyApplied);
        let items = backend.cart_items(cart.id).await.unwrap();
        assert_eq!(items[0].quantity, two);
    }

    #[tokio::test]
    async fn test_merge_item_missing_product_leaves_no_receipt() {
        let backend = MemoryBackend::new();
        let cart = user_with_cart(&backend).await;
        let key = Uuid::new_v4();

        let result = backend
            .merge_item(cart.id, ProductId::new(999), Quantity::ONE, key)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert!(!backend.state.lock().await.receipts.contains(&(cart.id, key)));
    }

    #[tokio::test]
    async fn test_get_or_create_cart_is_stable() {
        let backend = MemoryBackend::new();
        let cart = user_with_cart(&backend).await;
        assert_eq!(backend.get_or_create_cart(cart.user_id).await.unwrap(), cart);
        assert_eq!(backend.find_cart(cart.user_id).await.unwrap(), Some(cart));
    }

    #[tokio::test]
    async fn test_delete_product_removes_cart_lines() {
        let backend = MemoryBackend::new();
        let product = backend.create_product(&input("Tea")).await.unwrap();
        let cart = user_with_cart(&backend).await;
        backend
            .add_item(cart.id, product.id, Quantity::ONE)
            .await
            .unwrap();

        backend.delete_product(product.id).await.unwrap();
        assert!(backend.cart_items(cart.id).await.unwrap().is_empty());
        assert!(matches!(
            backend.delete_product(product.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_place_order_keeps_lines_added_after_snapshot() {
        let backend = MemoryBackend::new();
        let tea = backend.create_product(&input("Tea")).await.unwrap();
        let mug = backend.create_product(&input("Mug")).await.unwrap();
        let cart = user_with_cart(&backend).await;
        let two = Quantity::new(2).unwrap();
        backend.add_item(cart.id, tea.id, two).await.unwrap();
        backend.add_item(cart.id, mug.id, Quantity::ONE).await.unwrap();

        let order = NewOrder {
            user_id: cart.user_id,
            total: Price::usd(Decimal::new(2000, 2)),
            items: vec![OrderItem {
                product_id: tea.id,
                name: "Tea".into(),
                unit_price: tea.price,
                quantity: two,
            }],
        };
        backend.place_order(cart.id, &order).await.unwrap();

        let left = backend.cart_items(cart.id).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product_id, mug.id);

        // The tea line is gone, so the same snapshot can't be ordered twice.
        assert!(matches!(
            backend.place_order(cart.id, &order).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(backend.orders_for_user(cart.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let backend = MemoryBackend::new();
        let email = Email::parse("dup@example.com").unwrap();
        backend.create_with_password(&email, "a").await.unwrap();
        assert!(matches!(
            backend.create_with_password(&email, "b").await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
