//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marigold_core::{Discount, Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// List price before any discount.
    pub price: Price,
    pub discount: Option<Discount>,
    pub image_url: Option<String>,
    /// Inactive products are hidden from shoppers.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The price a shopper pays per unit right now.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.price.discounted(self.discount)
    }
}

/// Fields for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: Option<Discount>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Product as returned by the API, with the effective unit price.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub unit_price: Price,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let unit_price = product.unit_price();
        Self {
            product,
            unit_price,
        }
    }
}
