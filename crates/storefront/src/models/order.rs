//! Orders and sales reporting types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use marigold_core::{OrderId, OrderStatus, Price, ProductId, Quantity, UserId};

use super::cart::CartLine;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Price,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line, priced when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: Quantity,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

/// An order about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Price,
    pub items: Vec<OrderItem>,
}

/// Revenue for one product in a sales summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub units: u64,
    pub revenue: Decimal,
}

/// Aggregate sales figures. Cancelled orders are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub since: Option<DateTime<Utc>>,
    pub order_count: u64,
    pub revenue: Decimal,
    pub items_sold: u64,
    pub top_products: Vec<ProductSales>,
}

impl SalesSummary {
    /// Number of products listed in `top_products`.
    pub const TOP_PRODUCTS: usize = 5;

    /// Summarize a set of orders.
    #[must_use]
    pub fn from_orders<'a>(
        orders: impl IntoIterator<Item = &'a Order>,
        since: Option<DateTime<Utc>>,
    ) -> Self {
        let mut order_count = 0_u64;
        let mut revenue = Decimal::ZERO;
        let mut items_sold = 0_u64;
        let mut products: Vec<ProductSales> = Vec::new();

        let counted = orders.into_iter().filter(|o| {
            o.status.counts_as_sale() && since.is_none_or(|since| o.created_at >= since)
        });
        for order in counted {
            order_count += 1;
            revenue += order.total.amount;
            for item in &order.items {
                let units = u64::from(item.quantity.get());
                items_sold += units;
                let line = item.line_total().amount;
                if let Some(entry) = products.iter_mut().find(|p| p.product_id == item.product_id)
                {
                    entry.units += units;
                    entry.revenue += line;
                } else {
                    products.push(ProductSales {
                        product_id: item.product_id,
                        name: item.name.clone(),
                        units,
                        revenue: line,
                    });
                }
            }
        }

        products.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        products.truncate(Self::TOP_PRODUCTS);

        Self {
            since,
            order_count,
            revenue,
            items_sold,
            top_products: products,
        }
    }
}
