//! Cart domain types.
//!
//! Two carts exist side by side. The anonymous cart lives in the shopper's
//! session and carries price snapshots taken at add-to-cart time. The server
//! cart belongs to a user and only stores product IDs and quantities; its
//! lines are always priced from the current product record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use marigold_core::{CartId, CurrencyCode, Price, ProductId, Quantity, UserId};

use super::product::Product;

/// A user's server-side cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
}

/// A stored server cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Outcome of merging one anonymous line into a server cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// The quantity was added.
    Applied,
    /// A line with the same merge key was merged earlier; nothing changed.
    AlreadyApplied,
}

/// A line of the anonymous cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    /// Post-discount price when the line was added. Display only.
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "Quantity::deserialize_lenient")]
    pub quantity: Quantity,
    /// Idempotency key for the merge into a server cart.
    #[serde(default = "Uuid::new_v4")]
    pub merge_key: Uuid,
}

impl AnonymousItem {
    /// Snapshot a product into a new anonymous line.
    #[must_use]
    pub fn snapshot(product: &Product, quantity: Quantity) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.unit_price().amount,
            image_url: product.image_url.clone(),
            quantity,
            merge_key: Uuid::new_v4(),
        }
    }
}

/// A display-ready cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub image_url: Option<String>,
    pub quantity: Quantity,
    pub line_total: Price,
}

impl CartLine {
    /// Price a line from the current product record.
    #[must_use]
    pub fn priced(product: &Product, quantity: Quantity) -> Self {
        let unit_price = product.unit_price();
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price,
            image_url: product.image_url.clone(),
            quantity,
            line_total: unit_price.times(quantity),
        }
    }

    /// Build a line from an anonymous cart snapshot.
    #[must_use]
    pub fn from_snapshot(item: &AnonymousItem) -> Self {
        let unit_price = Price::usd(item.unit_price);
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            unit_price,
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            line_total: unit_price.times(item.quantity),
        }
    }
}

/// A whole cart as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: Price,
}

impl CartView {
    /// Total up a set of lines.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let currency = lines
            .first()
            .map_or(CurrencyCode::default(), |l| l.unit_price.currency_code);
        let subtotal = lines
            .iter()
            .try_fold(Price::zero(currency), |acc, line| {
                acc.checked_add(line.line_total)
            })
            .unwrap_or(Price::zero(currency));
        let item_count = lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.quantity.get()));

        Self {
            lines,
            item_count,
            subtotal,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_lines(Vec::new())
    }

    /// Quantity of a product in the cart, if present.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<Quantity> {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
