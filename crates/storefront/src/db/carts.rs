//! Server cart repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use marigold_core::{CartId, ProductId, Quantity, UserId};

use super::{CartStore, RepositoryError, not_found_on_foreign_key};
use crate::models::cart::{Cart, CartItem, MergeResult};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i64,
    user_id: i64,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: CartId::new(row.id),
            user_id: UserId::new(row.user_id),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i64,
    quantity: i32,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            quantity: to_quantity(row.quantity)?,
        })
    }
}

fn to_quantity(value: i32) -> Result<Quantity, RepositoryError> {
    Quantity::try_from(i64::from(value)).map_err(|e| RepositoryError::corrupt("cart quantity", e))
}

/// `PostgreSQL` cart storage.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn find_cart(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id FROM storefront.carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, CartRow>(
            "INSERT INTO storefront.carts (user_id) VALUES ($1)
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING id, user_id",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_on_foreign_key)?;

        Ok(row.into())
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, quantity FROM storefront.cart_items
             WHERE cart_id = $1
             ORDER BY created_at, product_id",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartItem::try_from).collect()
    }

    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError> {
        // Sums saturate at Quantity::MAX like the in-memory backend.
        let total: i32 = sqlx::query_scalar(
            "INSERT INTO storefront.cart_items (cart_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (cart_id, product_id)
             DO UPDATE SET quantity = LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INTEGER,
                           updated_at = NOW()
             RETURNING quantity",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_on_foreign_key)?;

        to_quantity(total)
    }

    async fn set_item_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.cart_items (cart_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (cart_id, product_id)
             DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(not_found_on_foreign_key)?;

        Ok(())
    }

    async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn merge_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        merge_key: Uuid,
    ) -> Result<MergeResult, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let receipt = sqlx::query(
            "INSERT INTO storefront.cart_merge_receipts (cart_id, merge_key, product_id, quantity)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (cart_id, merge_key) DO NOTHING",
        )
        .bind(cart_id)
        .bind(merge_key)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await?;

        if receipt.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(MergeResult::AlreadyApplied);
        }

        sqlx::query(
            "INSERT INTO storefront.cart_items (cart_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (cart_id, product_id)
             DO UPDATE SET quantity = LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INTEGER,
                           updated_at = NOW()",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(i32::from(quantity))
        .execute(&mut *tx)
        .await
        .map_err(not_found_on_foreign_key)?;

        tx.commit().await?;
        Ok(MergeResult::Applied)
    }
}
