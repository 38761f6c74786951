//! Order repository.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use marigold_core::{CartId, OrderId, OrderStatus, Price, ProductId, Quantity, UserId};

use super::{OrderStore, RepositoryError};
use crate::models::order::{NewOrder, Order, OrderItem, ProductSales, SalesSummary};

const ORDER_COLUMNS: &str = "id, user_id, status, total, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i64,
    product_id: i64,
    name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(i64::from(row.quantity))
            .map_err(|e| RepositoryError::corrupt("order quantity", e))?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            unit_price: Price::usd(row.unit_price),
            quantity,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_id: i64,
    name: String,
    units: i64,
    revenue: Decimal,
}

fn assemble(order: OrderRow, items: &mut Vec<OrderItemRow>) -> Result<Order, RepositoryError> {
    let status =
        OrderStatus::from_str(&order.status).map_err(|e| RepositoryError::corrupt("status", e))?;
    let (mine, rest): (Vec<_>, Vec<_>) = items.drain(..).partition(|i| i.order_id == order.id);
    *items = rest;

    Ok(Order {
        id: OrderId::new(order.id),
        user_id: UserId::new(order.user_id),
        status,
        total: Price::usd(order.total),
        items: mine
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<Result<_, _>>()?,
        created_at: order.created_at,
        updated_at: order.updated_at,
    })
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// `PostgreSQL` order storage.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the items for a batch of order rows.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, name, unit_price, quantity
             FROM storefront.order_items
             WHERE order_id = ANY($1)
             ORDER BY order_id, name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| assemble(row, &mut items))
            .collect()
    }

    async fn insert_items(
        tx: &mut Transaction<'_, Postgres>,
        order_id: i64,
        items: &[OrderItem],
    ) -> Result<(), RepositoryError> {
        for item in items {
            sqlx::query(
                "INSERT INTO storefront.order_items (order_id, product_id, name, unit_price, quantity)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.unit_price.amount)
            .bind(i32::from(item.quantity))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn place_order(
        &self,
        cart_id: CartId,
        order: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Claim exactly the snapshotted lines. Row locks make a concurrent
        // checkout of the same lines wait, then find nothing to delete.
        for item in &order.items {
            let deleted = sqlx::query(
                "DELETE FROM storefront.cart_items
                 WHERE cart_id = $1 AND product_id = $2 AND quantity = $3",
            )
            .bind(cart_id)
            .bind(item.product_id)
            .bind(i32::from(item.quantity))
            .execute(&mut *tx)
            .await?;
            if deleted.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(RepositoryError::Conflict(
                    "cart changed during checkout".into(),
                ));
            }
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.orders (user_id, status, total)
             VALUES ($1, $2, $3)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(order.total.amount)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_items(&mut tx, row.id, &order.items).await?;
        tx.commit().await?;

        let status = OrderStatus::from_str(&row.status)
            .map_err(|e| RepositoryError::corrupt("status", e))?;
        Ok(Order {
            id: OrderId::new(row.id),
            user_id: order.user_id,
            status,
            total: order.total,
            items: order.items.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE $1::TEXT IS NULL OR status = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.map(OrderStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_items(vec![row]).await?.pop())
    }

    async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.orders SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        let order = self.get_order(id).await?.ok_or(RepositoryError::NotFound)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "order {id} is {}, not {from}",
                order.status
            )));
        }
        Ok(order)
    }

    async fn sales_summary(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<SalesSummary, RepositoryError> {
        let (order_count, revenue): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total), 0)
             FROM storefront.orders
             WHERE status <> 'cancelled' AND ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductSalesRow>(
            "SELECT oi.product_id,
                    MIN(oi.name) AS name,
                    SUM(oi.quantity)::BIGINT AS units,
                    SUM(oi.unit_price * oi.quantity) AS revenue
             FROM storefront.order_items oi
             JOIN storefront.orders o ON o.id = oi.order_id
             WHERE o.status <> 'cancelled' AND ($1::TIMESTAMPTZ IS NULL OR o.created_at >= $1)
             GROUP BY oi.product_id
             ORDER BY revenue DESC, oi.product_id",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let items_sold = rows.iter().map(|r| count(r.units)).sum();
        let top_products = rows
            .into_iter()
            .take(SalesSummary::TOP_PRODUCTS)
            .map(|r| ProductSales {
                product_id: ProductId::new(r.product_id),
                name: r.name,
                units: count(r.units),
                revenue: r.revenue,
            })
            .collect();

        Ok(SalesSummary {
            since,
            order_count: count(order_count),
            revenue,
            items_sold,
            top_products,
        })
    }
}
